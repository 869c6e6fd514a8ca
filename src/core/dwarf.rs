//! dwarf2json parser for loading Volatility 3 compatible symbol files
use crate::error::AnalysisError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Structures whose field offsets the lsof walk needs from a symbol file
pub const LSOF_STRUCTS: &[&str] = &[
    "task_struct",
    "files_struct",
    "fdtable",
    "file",
    "path",
    "dentry",
    "hlist_bl_node",
    "qstr",
    "inode",
    "fs_struct",
    "mount",
    "vfsmount",
];

#[derive(Debug, Deserialize)]
struct SymbolEntry {
    address: u64,
}

#[derive(Debug, Deserialize)]
pub struct DwarfField {
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Deserialize)]
pub struct DwarfStruct {
    #[serde(default)]
    pub size: usize,
    #[serde(default)]
    pub fields: Option<HashMap<String, DwarfField>>,
}

#[derive(Debug, Deserialize)]
pub struct DwarfSymbols {
    #[serde(default)]
    symbols: HashMap<String, SymbolEntry>,
    #[serde(default)]
    user_types: HashMap<String, DwarfStruct>,
}

impl DwarfSymbols {
    pub fn load_from_file(path: &Path) -> Result<Self, AnalysisError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(content)
            .map_err(|e| AnalysisError::SymbolError(format!("Failed to parse dwarf2json: {}", e)))
    }

    pub fn get_symbol_address(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).map(|entry| entry.address)
    }

    pub fn get_field_offset(&self, struct_name: &str, field_name: &str) -> Option<usize> {
        self.user_types
            .get(struct_name)?
            .fields
            .as_ref()?
            .get(field_name)
            .map(|field| field.offset)
    }

    /// All symbols as name -> address
    pub fn get_symbols(&self) -> HashMap<String, u64> {
        self.symbols
            .iter()
            .map(|(name, entry)| (name.clone(), entry.address))
            .collect()
    }

    /// All field offsets of one structure
    pub fn get_struct_offsets(&self, struct_name: &str) -> Option<HashMap<String, usize>> {
        self.user_types.get(struct_name)?.fields.as_ref().map(|fields| {
            fields
                .iter()
                .map(|(name, field)| (name.clone(), field.offset))
                .collect()
        })
    }
}
