//! Configuration view and validation commands: `pocer config`.

use anyhow::Result;

use super::super::ConfigCommands;

fn print_defaults(toml: &pocer::pocer_config::PocerToml) {
    println!("[defaults]");
    println!("  max_attempts = {}", toml.defaults.max_attempts);
    println!("  output_limit = {}", toml.defaults.output_limit);
    println!("  format_retries = {}", toml.defaults.format_retries);
    println!("  skip_permissions = {}", toml.defaults.skip_permissions);
    println!();
}

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use pocer::config::{Config, POCER_DIR};
    use pocer::pocer_config::{CONFIG_FILE_NAME, PocerToml};

    let pocer_dir = project_dir.join(POCER_DIR);
    let config_path = pocer_dir.join(CONFIG_FILE_NAME);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Pocer Configuration");
            println!("===================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
                println!();

                let toml = PocerToml::load(&config_path)?;

                println!("[project]");
                if let Some(cmd) = &toml.project.claude_cmd {
                    println!("  claude_cmd = \"{}\"", cmd);
                }
                if let Some(cmd) = &toml.project.forge_cmd {
                    println!("  forge_cmd = \"{}\"", cmd);
                }
                if let Some(cmd) = &toml.project.analyzer_cmd {
                    println!("  analyzer_cmd = \"{}\"", cmd.display());
                }
                if let Some(file) = &toml.project.analysis_file {
                    println!("  analysis_file = \"{}\"", file.display());
                }
                println!("  src_dir = \"{}\"", toml.project.src_dir.display());
                println!("  test_dir = \"{}\"", toml.project.test_dir.display());
                println!("  exploit_dir = \"{}\"", toml.project.exploit_dir.display());
                println!();

                print_defaults(&toml);

                for (name, section) in [
                    ("builder", &toml.builder),
                    ("hacker", &toml.hacker),
                    ("tester", &toml.tester),
                ] {
                    print_section(name, section);
                }

                println!("Effective values (with env/CLI overrides):");
                let config = Config::new(project_dir.to_path_buf(), false, None)?;
                println!("  claude_cmd = \"{}\"", config.claude_cmd);
                println!("  forge_cmd = \"{}\"", config.forge_cmd);
                println!("  skip_permissions = {}", config.skip_permissions);
                println!();
            } else {
                println!("No pocer.toml found at {}", config_path.display());
                println!();
                println!("Using default configuration:");
                print_defaults(&PocerToml::default());
                println!("Run 'pocer config init' to create a pocer.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No pocer.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = PocerToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("pocer.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !pocer_dir.exists() {
                std::fs::create_dir_all(&pocer_dir)?;
            }

            PocerToml::default().save(&config_path)?;

            println!("Created pocer.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [project] claude_cmd, forge_cmd, analyzer_cmd, directories");
            println!("  - [defaults] max_attempts, output_limit, format_retries");
            println!("  - [builder] / [hacker] / [tester] model and skeleton");
            println!();
        }
    }

    Ok(())
}

fn print_section(name: &str, section: &pocer::pocer_config::StageSection) {
    if section.model.is_none() && section.skeleton.is_none() {
        return;
    }
    println!("[{}]", name);
    if let Some(model) = &section.model {
        println!("  model = \"{}\"", model);
    }
    if let Some(skeleton) = &section.skeleton {
        println!("  skeleton = \"{}\"", skeleton.display());
    }
    println!();
}
