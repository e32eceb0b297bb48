//! Shared UI icons and emojis.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "* ");

// Artifact indicators
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+ ");
pub static FILE_MOD: Emoji<'_, '_> = Emoji("📝 ", "~ ");
pub static FILE_DEL: Emoji<'_, '_> = Emoji("🗑️  ", "- ");

// Stage indicators
pub static HAMMER: Emoji<'_, '_> = Emoji("🔨 ", "[B] ");
pub static SKULL: Emoji<'_, '_> = Emoji("💀 ", "[H] ");
pub static TEST: Emoji<'_, '_> = Emoji("🧪 ", "[T] ");
