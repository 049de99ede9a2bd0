//! Shared UI icons and emojis.

use console::Emoji;

// Outcome indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Log levels
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[i]");
pub static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

// Connectivity
pub static LINK: Emoji<'_, '_> = Emoji("🔗 ", "[+]");
pub static PIVOT: Emoji<'_, '_> = Emoji("🔄 ", "[~]");
pub static UNPLUGGED: Emoji<'_, '_> = Emoji("🔌 ", "[-]");
