use std::fmt;

use bitfield::bitfield;

use crate::cortexm::format_word;

bitfield! {
    /// CFSR - Configurable Fault Status Register (`UFSR[31:16]`, `BFSR[15:8]`, `MMFSR[7:0]`)
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Cfsr(u32);
    impl Debug;
    /// Aggregate view of the UsageFault bits.
    pub u16, usage_fault, _: 31, 16;
    /// SDIV or UDIV executed with a divisor of 0 while DIV_0_TRP is enabled in the CCR.
    pub divbyzero, _: 25;
    /// Unaligned access while UNALIGN_TRP is enabled, or an unaligned multi-word access.
    pub unaligned, _: 24;
    /// Coprocessor access while the coprocessor is disabled or not present.
    pub nocp, _: 19;
    /// Integrity check error on EXC_RETURN.
    pub invpc, _: 18;
    /// Instruction executed with an invalid EPSR.T or EPSR.IT field.
    pub invstate, _: 17;
    /// Undefined instruction.
    pub undefinstr, _: 16;
    /// Aggregate view of the BusFault bits.
    pub u8, bus_fault, _: 15, 8;
    /// BFAR has valid contents.
    pub bfarvalid, _: 15;
    /// BusFault during floating-point lazy state preservation.
    pub lsperr, _: 13;
    /// Derived BusFault on exception entry.
    pub stkerr, _: 12;
    /// Derived BusFault on exception return.
    pub unstkerr, _: 11;
    /// Imprecise data access error.
    pub impreciserr, _: 10;
    /// Precise data access error.
    pub preciserr, _: 9;
    /// BusFault on an instruction prefetch.
    pub ibuserr, _: 8;
    /// Aggregate view of the MemManage fault bits.
    pub u8, mem_manage_fault, _: 7, 0;
    /// MMAR has valid contents.
    pub mmarvalid, _: 7;
    /// MemManage fault during floating-point lazy state preservation.
    pub mlsperr, _: 5;
    /// Derived MemManage fault on exception entry.
    pub mstkerr, _: 4;
    /// Derived MemManage fault on exception return.
    pub munstkerr, _: 3;
    /// Data access violation.
    pub daccviol, _: 1;
    /// MPU or Execute Never (XN) violation on an instruction fetch.
    pub iaccviol, _: 0;
}

impl From<u32> for Cfsr {
    fn from(value: u32) -> Self {
        Cfsr(value)
    }
}

/// The three fault classes a CFSR value can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCategory {
    MemoryManagement,
    Bus,
    Usage,
}

impl FaultCategory {
    pub fn title(self) -> &'static str {
        match self {
            FaultCategory::MemoryManagement => "MemManage Fault",
            FaultCategory::Bus => "BusFault",
            FaultCategory::Usage => "UsageFault",
        }
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One set sub-flag of the CFSR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfsrFinding {
    pub category: FaultCategory,
    pub flag_name: &'static str,
    pub description: &'static str,
    /// The faulting address, for `MMARVALID`/`BFARVALID` when the address register was dumped.
    pub extra_detail: Option<String>,
}

/// A fault category whose status bits are non-zero, with the sub-flags that are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultBlock {
    pub category: FaultCategory,
    pub findings: Vec<CfsrFinding>,
}

#[derive(Clone, Copy)]
enum FaultAddress {
    Mmar,
    Bfar,
}

struct Flag {
    name: &'static str,
    description: &'static str,
    is_set: fn(&Cfsr) -> bool,
    address: Option<FaultAddress>,
}

impl Flag {
    const fn new(name: &'static str, description: &'static str, is_set: fn(&Cfsr) -> bool) -> Self {
        Self {
            name,
            description,
            is_set,
            address: None,
        }
    }

    const fn with_address(mut self, address: FaultAddress) -> Self {
        self.address = Some(address);
        self
    }
}

struct CategoryLayout {
    category: FaultCategory,
    is_present: fn(&Cfsr) -> bool,
    flags: &'static [Flag],
}

// Report order, both across and within categories.
static LAYOUT: [CategoryLayout; 3] = [
    CategoryLayout {
        category: FaultCategory::MemoryManagement,
        is_present: |cfsr| cfsr.mem_manage_fault() != 0,
        flags: &[
            Flag::new("MMARVALID", "MMAR holds a valid fault address", Cfsr::mmarvalid)
                .with_address(FaultAddress::Mmar),
            Flag::new(
                "MLSPERR",
                "Fault during floating-point lazy state preservation",
                Cfsr::mlsperr,
            ),
            Flag::new("MSTKERR", "Derived fault on exception entry", Cfsr::mstkerr),
            Flag::new("MUNSTKERR", "Derived fault on exception return", Cfsr::munstkerr),
            Flag::new("DACCVIOL", "Data access violation", Cfsr::daccviol),
            Flag::new(
                "IACCVIOL",
                "MPU or Execute Never (XN) violation on an instruction fetch",
                Cfsr::iaccviol,
            ),
        ],
    },
    CategoryLayout {
        category: FaultCategory::Bus,
        is_present: |cfsr| cfsr.bus_fault() != 0,
        flags: &[
            Flag::new("BFARVALID", "BFAR holds a valid fault address", Cfsr::bfarvalid)
                .with_address(FaultAddress::Bfar),
            Flag::new(
                "LSPERR",
                "Fault during floating-point lazy state preservation",
                Cfsr::lsperr,
            ),
            Flag::new("STKERR", "Derived fault on exception entry", Cfsr::stkerr),
            Flag::new("UNSTKERR", "Derived fault on exception return", Cfsr::unstkerr),
            Flag::new("IMPRECISERR", "Imprecise data access error", Cfsr::impreciserr),
            Flag::new("PRECISERR", "Precise data access error", Cfsr::preciserr),
            Flag::new("IBUSERR", "Bus error on an instruction prefetch", Cfsr::ibuserr),
        ],
    },
    CategoryLayout {
        category: FaultCategory::Usage,
        is_present: |cfsr| cfsr.usage_fault() != 0,
        flags: &[
            Flag::new("DIVBYZERO", "Division by zero", Cfsr::divbyzero),
            Flag::new("UNALIGNED", "Unaligned access", Cfsr::unaligned),
            Flag::new("NOCP", "Coprocessor access error", Cfsr::nocp),
            Flag::new("INVPC", "Integrity check error on EXC_RETURN", Cfsr::invpc),
            Flag::new(
                "INVSTATE",
                "Instruction executed with invalid EPSR.T or EPSR.IT field",
                Cfsr::invstate,
            ),
            Flag::new("UNDEFINSTR", "Undefined instruction", Cfsr::undefinstr),
        ],
    },
];

/// Decodes a CFSR value into one block per active fault category.
///
/// `mmar` and `bfar` are only used to annotate `MMARVALID` and `BFARVALID`; when they are
/// `None` the finding is reported without an address.
pub fn decode(cfsr: u32, mmar: Option<u32>, bfar: Option<u32>) -> Vec<FaultBlock> {
    let cfsr = Cfsr::from(cfsr);

    LAYOUT
        .iter()
        .filter(|layout| (layout.is_present)(&cfsr))
        .map(|layout| FaultBlock {
            category: layout.category,
            findings: layout
                .flags
                .iter()
                .filter(|flag| (flag.is_set)(&cfsr))
                .map(|flag| CfsrFinding {
                    category: layout.category,
                    flag_name: flag.name,
                    description: flag.description,
                    extra_detail: flag
                        .address
                        .and_then(|address| match address {
                            FaultAddress::Mmar => mmar,
                            FaultAddress::Bfar => bfar,
                        })
                        .map(format_word),
                })
                .collect(),
        })
        .collect()
}

/// All findings of all blocks, in report order.
pub fn findings(blocks: &[FaultBlock]) -> impl Iterator<Item = &CfsrFinding> {
    blocks.iter().flat_map(|block| block.findings.iter())
}
