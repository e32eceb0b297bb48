//! Prompt text for the three model-backed stages and the JSON replies they
//! must produce.

use crate::stage::FailureContext;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// A structured model reply. `FORMAT` is the JSON shape shown to the model
/// whenever it has to be reminded how to answer.
pub trait ModelReply: DeserializeOwned {
    const FORMAT: &'static str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildReply {
    pub my_test_code: String,
    #[serde(default)]
    pub my_explanation: String,
}

impl ModelReply for BuildReply {
    const FORMAT: &'static str =
        r#"{"my_test_code": "<your full test contract code>", "my_explanation": "<your explanation>"}"#;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExploitReply {
    pub my_attempt: String,
    #[serde(default)]
    pub my_explanation: String,
}

impl ModelReply for ExploitReply {
    const FORMAT: &'static str =
        r#"{"my_attempt": "<your full exploit code>", "my_explanation": "<your explanation>"}"#;
}

/// The tester's verdict. `status` stays a raw tag here and is parsed into
/// [`crate::status::Status`] by the tester stage.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisReply {
    pub status: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub suggestions: String,
}

impl ModelReply for AnalysisReply {
    const FORMAT: &'static str = r#"{"status": "<builder_error | hacker_failure | unknown>", "feedback": "<detailed feedback>", "suggestions": "<actionable suggestions>"}"#;
}

const OUTPUT_RULES: &str = r#"## OUTPUT RULES
- Reply with the JSON object only. No text before or after it.
- Do not wrap the JSON in Markdown code fences.
- Escape quotes, backslashes and newlines inside string values."#;

/// Everything the builder needs to write a test harness.
pub struct BuildPrompt<'a> {
    pub source_name: &'a str,
    pub stem: &'a str,
    pub source: &'a str,
    pub bugs: &'a str,
    pub imports: &'a str,
    pub skeleton: Option<&'a str>,
    pub prior: Option<&'a FailureContext>,
    pub current_test: Option<&'a str>,
}

pub fn build_prompt(input: &BuildPrompt<'_>) -> String {
    match input.prior {
        None => build_generation(input),
        Some(prior) => build_regeneration(input, prior),
    }
}

fn build_generation(input: &BuildPrompt<'_>) -> String {
    let skeleton_section = match input.skeleton {
        Some(skeleton) => format!(
            "\n## TEST SKELETON\nComplete this skeleton. Keep its structure and fill in the setup and assertions.\n```solidity\n{}\n```\n",
            skeleton
        ),
        None => String::new(),
    };

    format!(
        r#"You are an expert Solidity security engineer writing Foundry tests.

## TARGET CONTRACT ({source_name})
```solidity
{source}
```

## STATIC ANALYSIS FINDINGS
{bugs}

## IMPORTED FILES
{imports}
{skeleton_section}
## TASK
Write a Foundry test contract named `{stem}Test` that proves one of the findings is exploitable.
1. Import the target with `import "../src/{stem}.sol";`
2. Import the exploit with `import "../exploits/{stem}Exploit.sol";`
3. Deploy the target and the exploit contract `{stem}Exploit` in `setUp`.
4. Call `hack()` on the exploit and assert the state change that proves the exploit worked.
5. Do not implement the exploit yourself; another engineer writes `{stem}Exploit`.

## OUTPUT FORMAT
{format}

{rules}"#,
        source_name = input.source_name,
        source = input.source,
        bugs = input.bugs,
        imports = input.imports,
        skeleton_section = skeleton_section,
        stem = input.stem,
        format = BuildReply::FORMAT,
        rules = OUTPUT_RULES,
    )
}

fn build_regeneration(input: &BuildPrompt<'_>, prior: &FailureContext) -> String {
    let current = input
        .current_test
        .map(|code| format!("\n## YOUR CURRENT TEST\n```solidity\n{}\n```\n", code))
        .unwrap_or_default();

    format!(
        r#"Your test contract for {source_name} did not work. The failure was attributed to the test, not the exploit.
{current}
## FORGE OUTPUT
```
{output}
```

## FAILURE ANALYSIS
{analysis}

## TASK
Fix `{stem}Test`. It must still import `../src/{stem}.sol` and `../exploits/{stem}Exploit.sol` and call `hack()` on `{stem}Exploit`.

## OUTPUT FORMAT
{format}

{rules}"#,
        source_name = input.source_name,
        current = current,
        output = prior.output,
        analysis = prior.classification.as_prompt_context(),
        stem = input.stem,
        format = BuildReply::FORMAT,
        rules = OUTPUT_RULES,
    )
}

/// Everything the hacker needs to write an exploit.
pub struct ExploitPrompt<'a> {
    pub source_name: &'a str,
    pub stem: &'a str,
    pub source: &'a str,
    pub bugs: &'a str,
    pub imports: &'a str,
    pub test_code: &'a str,
    pub skeleton: Option<&'a str>,
    pub prior: Option<&'a FailureContext>,
}

pub fn exploit_prompt(input: &ExploitPrompt<'_>) -> String {
    match input.prior {
        None => exploit_first_attempt(input),
        Some(prior) => exploit_reattempt(input, prior),
    }
}

fn exploit_first_attempt(input: &ExploitPrompt<'_>) -> String {
    let skeleton_section = match input.skeleton {
        Some(skeleton) => format!(
            "\n## EXPLOIT SKELETON\nComplete this contract. You may add functions and helper contracts.\n```solidity\n{}\n```\n",
            skeleton
        ),
        None => String::new(),
    };

    format!(
        r#"You are an expert smart contract auditor writing a proof-of-concept exploit.

## TARGET CONTRACT ({source_name})
```solidity
{source}
```

## STATIC ANALYSIS FINDINGS
{bugs}

## IMPORTED FILES
{imports}
{skeleton_section}
## TEST THE EXPLOIT MUST PASS
```solidity
{test_code}
```

## TASK
Write the contract `{stem}Exploit` with a `hack()` function that makes every assertion in the test pass.
Mind the gas limit. Keep the constructor signature the test uses.

## OUTPUT FORMAT
{format}

{rules}"#,
        source_name = input.source_name,
        source = input.source,
        bugs = input.bugs,
        imports = input.imports,
        skeleton_section = skeleton_section,
        test_code = input.test_code,
        stem = input.stem,
        format = ExploitReply::FORMAT,
        rules = OUTPUT_RULES,
    )
}

fn exploit_reattempt(input: &ExploitPrompt<'_>, prior: &FailureContext) -> String {
    format!(
        r#"Your exploit failed the test.

## FORGE OUTPUT
```
{output}
```

## FAILURE ANALYSIS
{analysis}

## STATIC ANALYSIS FINDINGS
{bugs}

## CURRENT TEST
```solidity
{test_code}
```

## TASK
1. Find the cause of the failure in the output and the analysis.
2. Return the complete revised `{stem}Exploit` contract.

## OUTPUT FORMAT
{format}

{rules}"#,
        output = prior.output,
        analysis = prior.classification.as_prompt_context(),
        bugs = input.bugs,
        test_code = input.test_code,
        stem = input.stem,
        format = ExploitReply::FORMAT,
        rules = OUTPUT_RULES,
    )
}

/// Inputs for attributing a failed `forge test` run.
pub struct AnalysisPrompt<'a> {
    pub source_name: &'a str,
    pub source: &'a str,
    pub test_name: &'a str,
    pub test_code: &'a str,
    pub exploit_name: &'a str,
    pub exploit_code: &'a str,
    pub output: &'a str,
}

pub fn analysis_prompt(input: &AnalysisPrompt<'_>) -> String {
    format!(
        r#"You are an expert in Solidity smart contracts and the Foundry test framework.

## SOURCE CONTRACT ({source_name})
```solidity
{source}
```

## TEST CONTRACT ({test_name})
```solidity
{test_code}
```

## EXPLOIT CONTRACT ({exploit_name})
```solidity
{exploit_code}
```

## FORGE OUTPUT
```
{output}
```

## TASK
Decide which file caused the failure:
- `builder_error`: the test does not compile, or the test file itself is wrong.
- `hacker_failure`: the exploit does not compile, or the test assertions fail because the exploit does not work.
- `unknown`: neither of the above applies.
Then give detailed feedback and concrete suggestions for whoever fixes it.

## OUTPUT FORMAT
{format}

{rules}"#,
        source_name = input.source_name,
        source = input.source,
        test_name = input.test_name,
        test_code = input.test_code,
        exploit_name = input.exploit_name,
        exploit_code = input.exploit_code,
        output = input.output,
        format = AnalysisReply::FORMAT,
        rules = OUTPUT_RULES,
    )
}

/// Re-prompt sent on the same conversation after an unparsable reply.
pub fn incorrect_format(format: &str, reason: &str) -> String {
    format!(
        r#"Your previous reply could not be parsed ({reason}). Answer again.

## OUTPUT FORMAT
{format}

{rules}"#,
        reason = reason,
        format = format,
        rules = OUTPUT_RULES,
    )
}
