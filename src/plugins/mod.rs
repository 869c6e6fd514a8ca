//! Plugin registry for the lsof tool
pub mod lsof;
pub mod plugin_trait;

pub use lsof::{LsofPlugin, ProcessFilter};

use plugin_trait::ForensicPlugin;

/// Every available plugin with its default settings
pub fn available_plugins() -> Vec<Box<dyn ForensicPlugin>> {
    vec![Box::new(LsofPlugin::default())]
}
