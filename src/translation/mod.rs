//! Memory translation module for converting kernel virtual addresses to file offsets
use crate::memory::MemoryRegion;
use log::trace;

// x86-64 kernel address space constants
const KERNEL_MAP_BASE: u64 = 0xffffffff80000000; // __START_KERNEL_map
const KERNEL_MAP_END: u64 = 0xffffffffff000000;
/// Direct map base for 4-level paging since 4.20
pub const PAGE_OFFSET: u64 = 0xffff888000000000;
const PAGE_OFFSET_END: u64 = 0xffffc88000000000;
/// Direct map base for 4-level paging before 4.20
pub const PAGE_OFFSET_PRE_4_20: u64 = 0xffff880000000000;
const PAGE_OFFSET_PRE_4_20_END: u64 = 0xffffc80000000000;
/// Direct map base with 5-level paging
pub const PAGE_OFFSET_5LEVEL: u64 = 0xff11000000000000;
const PAGE_OFFSET_5LEVEL_END: u64 = 0xff91000000000000;

/// Default physical load address of the kernel image (16MB)
pub const DEFAULT_PHYS_BASE: u64 = 0x1000000;

/// Translates kernel virtual addresses through the direct map and kernel text mapping,
/// then through the capture's region list.
pub struct MemoryTranslator {
    regions: Vec<MemoryRegion>,
    phys_base: u64,
}

impl MemoryTranslator {
    pub fn new(regions: Vec<MemoryRegion>) -> Self {
        MemoryTranslator {
            regions,
            phys_base: DEFAULT_PHYS_BASE,
        }
    }

    /// Set the physical base address of the kernel image
    pub fn set_phys_base(&mut self, phys_base: u64) {
        self.phys_base = phys_base;
    }

    pub fn phys_base(&self) -> u64 {
        self.phys_base
    }

    /// Convert a kernel virtual address to a physical address
    ///
    /// - Kernel text/data: `phys_base + (virtual - __START_KERNEL_map)`
    /// - Direct map: `virtual - PAGE_OFFSET`. The 4.20+ base is checked before the older
    ///   one since it lies inside the older range.
    fn virtual_to_physical(&self, virtual_addr: u64) -> Option<u64> {
        if (KERNEL_MAP_BASE..KERNEL_MAP_END).contains(&virtual_addr) {
            return self.phys_base.checked_add(virtual_addr - KERNEL_MAP_BASE);
        }

        if (PAGE_OFFSET..PAGE_OFFSET_END).contains(&virtual_addr) {
            return Some(virtual_addr - PAGE_OFFSET);
        }

        if (PAGE_OFFSET_PRE_4_20..PAGE_OFFSET_PRE_4_20_END).contains(&virtual_addr) {
            return Some(virtual_addr - PAGE_OFFSET_PRE_4_20);
        }

        if (PAGE_OFFSET_5LEVEL..PAGE_OFFSET_5LEVEL_END).contains(&virtual_addr) {
            return Some(virtual_addr - PAGE_OFFSET_5LEVEL);
        }

        trace!("0x{:x} is not in a known kernel mapping", virtual_addr);
        None
    }

    /// Translate a virtual kernel address to a file offset in the capture
    pub fn virtual_to_file_offset(&self, virtual_addr: u64) -> Option<u64> {
        let physical_addr = self.virtual_to_physical(virtual_addr)?;
        self.regions
            .iter()
            .find_map(|region| region.file_offset_of(physical_addr))
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> MemoryTranslator {
        MemoryTranslator::new(vec![
            MemoryRegion {
                start: 0,
                end: 0xfff,
                file_offset: 0x20,
            },
            MemoryRegion {
                start: 0x1000000,
                end: 0x1ffffff,
                file_offset: 0x2000,
            },
        ])
    }

    #[test]
    fn test_direct_map_translation() {
        let t = translator();
        assert_eq!(t.virtual_to_file_offset(PAGE_OFFSET + 0x10), Some(0x30));
        assert_eq!(t.virtual_to_file_offset(PAGE_OFFSET_PRE_4_20 + 0x10), Some(0x30));
        assert_eq!(t.virtual_to_file_offset(PAGE_OFFSET_5LEVEL + 0x10), Some(0x30));
        assert_eq!(t.virtual_to_file_offset(0xff11_0000_0100_0020), Some(0x2020));
    }

    #[test]
    fn test_kernel_text_translation_uses_phys_base() {
        let t = translator();
        // _text at 0xffffffff81000000 -> physical 0x1000000 + 0x1000000 is outside regions
        assert_eq!(t.virtual_to_file_offset(0xffffffff81000000), None);

        let mut t = translator();
        t.set_phys_base(0);
        assert_eq!(t.virtual_to_file_offset(0xffffffff81000010), Some(0x2010));
        assert_eq!(t.phys_base(), 0);
    }

    #[test]
    fn test_user_and_unmapped_addresses() {
        let t = translator();
        assert_eq!(t.virtual_to_file_offset(0), None);
        assert_eq!(t.virtual_to_file_offset(0x7fff_0000_0000), None);
        assert_eq!(t.virtual_to_file_offset(PAGE_OFFSET + 0x5000), None);
    }
}
