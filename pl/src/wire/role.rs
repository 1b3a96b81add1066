//! Role identities and receiver bitmasks
//!
//! Every participant has exactly one [`Role`]. Receivers are addressed with a
//! [`Roles`] bitmask, so one envelope can reach several participant kinds.

use std::fmt;
use std::ops::{BitAnd, BitOr};

/// Bitmask of participant kinds, used as a receiver filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Roles(u32);

impl Roles {
    pub const NONE: Roles = Roles(0);
    pub const COORDINATOR: Roles = Roles(1 << 0);
    pub const FIRST_STAGE: Roles = Roles(1 << 1);
    pub const SECOND_STAGE: Roles = Roles(1 << 2);
    pub const THIRD_STAGE: Roles = Roles(1 << 3);
    pub const LOGS_COLLECTOR: Roles = Roles(1 << 4);
    pub const OPERATOR: Roles = Roles(1 << 5);

    pub const ANY_WORKER: Roles = Roles(Self::FIRST_STAGE.0 | Self::SECOND_STAGE.0 | Self::THIRD_STAGE.0);
    pub const ANY_CLIENT: Roles = Roles(Self::ANY_WORKER.0 | Self::LOGS_COLLECTOR.0 | Self::OPERATOR.0);
    pub const ALL: Roles = Roles(Self::COORDINATOR.0 | Self::ANY_CLIENT.0);

    /// Wrap raw bits without validation (wire values may carry unknown bits)
    pub const fn from_bits(bits: u32) -> Self {
        Roles(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if any bit of `other` is set in `self`
    pub const fn intersects(self, other: Roles) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every bit of `other` is set in `self`
    pub const fn contains(self, other: Roles) -> bool {
        self.0 & other.0 == other.0
    }

    /// The single role this mask names, if exactly one known bit is set
    pub fn single(self) -> Option<Role> {
        Role::try_from(self.0).ok()
    }
}

impl BitOr for Roles {
    type Output = Roles;

    fn bitor(self, rhs: Roles) -> Roles {
        Roles(self.0 | rhs.0)
    }
}

impl BitAnd for Roles {
    type Output = Roles;

    fn bitand(self, rhs: Roles) -> Roles {
        Roles(self.0 & rhs.0)
    }
}

impl From<Role> for Roles {
    fn from(role: Role) -> Self {
        Roles(role as u32)
    }
}

impl fmt::Display for Roles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(role) = self.single() {
            return write!(f, "{}", role);
        }
        let names: Vec<&str> = Role::ALL
            .iter()
            .filter(|role| self.intersects(Roles::from(**role)))
            .map(|role| role.name())
            .collect();
        let unknown = self.0 & !Roles::ALL.0;
        match (names.is_empty(), unknown) {
            (true, 0) => write!(f, "nobody"),
            (true, bits) => write!(f, "unknown roles[{:#x}]", bits),
            (false, 0) => write!(f, "{}", names.join(" | ")),
            (false, bits) => write!(f, "{} | unknown[{:#x}]", names.join(" | "), bits),
        }
    }
}

/// Identity of a single participant; exactly one bit on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Role {
    Coordinator = 1 << 0,
    FirstStage = 1 << 1,
    SecondStage = 1 << 2,
    ThirdStage = 1 << 3,
    LogsCollector = 1 << 4,
    Operator = 1 << 5,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Coordinator,
        Role::FirstStage,
        Role::SecondStage,
        Role::ThirdStage,
        Role::LogsCollector,
        Role::Operator,
    ];

    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Human-readable name used in audit records and narration
    pub const fn name(self) -> &'static str {
        match self {
            Role::Coordinator => "coordinator",
            Role::FirstStage => "first stage worker",
            Role::SecondStage => "second stage worker",
            Role::ThirdStage => "third stage worker",
            Role::LogsCollector => "logs collector",
            Role::Operator => "operator",
        }
    }

    /// Short name used for log file names
    pub const fn slug(self) -> &'static str {
        match self {
            Role::Coordinator => "coordinator",
            Role::FirstStage => "first-stage",
            Role::SecondStage => "second-stage",
            Role::ThirdStage => "third-stage",
            Role::LogsCollector => "logs-collector",
            Role::Operator => "operator",
        }
    }

    /// The stage a work item from this role moves to next
    pub const fn next_stage(self) -> Option<Role> {
        match self {
            Role::FirstStage => Some(Role::SecondStage),
            Role::SecondStage => Some(Role::ThirdStage),
            _ => None,
        }
    }
}

impl TryFrom<u32> for Role {
    type Error = u32;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Role::ALL.into_iter().find(|role| role.bits() == bits).ok_or(bits)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
