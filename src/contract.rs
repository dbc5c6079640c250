//! Operation contract
//!
//! The fixed, ordered set of operations every accounting backend must provide.
//! Ordinals are part of the compatibility contract: an operation keeps its
//! ordinal forever, new operations are only appended, and any change to the
//! set bumps [`CONTRACT_VERSION`]. Backends declare the version they were
//! built against and the context refuses to bind a mismatching one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the operation contract. Bump when the operation set changes.
pub const CONTRACT_VERSION: u32 = 1;

/// Major plugin type every accounting backend is registered under.
pub const MAJOR_TYPE: &str = "jobacct";

/// Number of operations in the contract.
pub const OPERATION_COUNT: usize = 18;

/// Symbol names, one per [`Operation`], in ordinal order.
pub const OPERATION_SYMBOLS: [&str; OPERATION_COUNT] = [
    "jobacct_p_init_struct",
    "jobacct_p_alloc",
    "jobacct_p_free",
    "jobacct_p_setinfo",
    "jobacct_p_getinfo",
    "jobacct_p_aggregate",
    "jobacct_p_pack",
    "jobacct_p_unpack",
    "jobacct_p_init_slurmctld",
    "jobacct_p_fini_slurmctld",
    "jobacct_p_job_start_slurmctld",
    "jobacct_p_job_complete_slurmctld",
    "jobacct_p_step_start_slurmctld",
    "jobacct_p_step_complete_slurmctld",
    "jobacct_p_suspend_slurmctld",
    "jobacct_p_startpoll",
    "jobacct_p_endpoll",
    "jobacct_p_suspendpoll",
];

/// One slot of the operation contract.
///
/// Discriminants are the contract ordinals and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Operation {
    InitStruct = 0,
    Alloc = 1,
    Free = 2,
    SetInfo = 3,
    GetInfo = 4,
    Aggregate = 5,
    Pack = 6,
    Unpack = 7,
    InitBackend = 8,
    FiniBackend = 9,
    JobStart = 10,
    JobComplete = 11,
    StepStart = 12,
    StepComplete = 13,
    Suspend = 14,
    StartPoll = 15,
    EndPoll = 16,
    SuspendPoll = 17,
}

impl Operation {
    /// Every operation in ordinal order.
    pub const ALL: [Operation; OPERATION_COUNT] = [
        Operation::InitStruct,
        Operation::Alloc,
        Operation::Free,
        Operation::SetInfo,
        Operation::GetInfo,
        Operation::Aggregate,
        Operation::Pack,
        Operation::Unpack,
        Operation::InitBackend,
        Operation::FiniBackend,
        Operation::JobStart,
        Operation::JobComplete,
        Operation::StepStart,
        Operation::StepComplete,
        Operation::Suspend,
        Operation::StartPoll,
        Operation::EndPoll,
        Operation::SuspendPoll,
    ];

    /// Contract ordinal
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Exported symbol name for this operation
    pub fn symbol(self) -> &'static str {
        OPERATION_SYMBOLS[self.ordinal()]
    }

    /// Look up an operation by its exported symbol name
    pub fn from_symbol(symbol: &str) -> Option<Operation> {
        OPERATION_SYMBOLS
            .iter()
            .position(|s| *s == symbol)
            .map(|idx| Operation::ALL[idx])
    }

    /// Short kebab-case name used in logs and CLI output
    pub fn name(self) -> &'static str {
        match self {
            Operation::InitStruct => "init-struct",
            Operation::Alloc => "allocate-record",
            Operation::Free => "free-record",
            Operation::SetInfo => "set-field",
            Operation::GetInfo => "get-field",
            Operation::Aggregate => "aggregate",
            Operation::Pack => "serialize",
            Operation::Unpack => "deserialize",
            Operation::InitBackend => "init-backend",
            Operation::FiniBackend => "fini-backend",
            Operation::JobStart => "on-job-start",
            Operation::JobComplete => "on-job-complete",
            Operation::StepStart => "on-step-start",
            Operation::StepComplete => "on-step-complete",
            Operation::Suspend => "on-suspend",
            Operation::StartPoll => "start-polling",
            Operation::EndPoll => "end-polling",
            Operation::SuspendPoll => "suspend-polling",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the full plugin type for a backend name.
///
/// Accepts either a short name (`"log"`) or an already qualified type
/// (`"jobacct/log"`). Returns `None` for an empty name.
pub fn plugin_type_for(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        Some(name.to_string())
    } else {
        Some(format!("{}/{}", MAJOR_TYPE, name))
    }
}

/// Split a plugin type into its major type and name.
pub fn split_plugin_type(plugin_type: &str) -> Option<(&str, &str)> {
    plugin_type
        .split_once('/')
        .filter(|(major, name)| !major.is_empty() && !name.is_empty())
}
