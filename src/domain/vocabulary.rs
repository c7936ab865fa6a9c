//! Closed sets of values stored as text columns.
//!
//! Rows keep plain strings (as the tables do); these enums validate input
//! before it is written and give handlers something typed to match on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        format!(
                            "invalid {} '{}', expected one of: {}",
                            stringify!($name),
                            s,
                            allowed.join(", ")
                        )
                    })
            }
        }
    };
}

text_enum!(MemberStatus {
    Active => "active",
    Inactive => "inactive",
    Suspended => "suspended",
});

text_enum!(ClassType {
    Kids => "kids",
    Adult => "adult",
    Competition => "competition",
    OpenMat => "open_mat",
    Private => "private",
});

text_enum!(AttendanceStatus {
    Present => "present",
    Absent => "absent",
    Excused => "excused",
});

text_enum!(EvaluationType {
    BeltExam => "belt_exam",
    StripeCheck => "stripe_check",
    Technical => "technical",
});

text_enum!(EvaluationStatus {
    Scheduled => "scheduled",
    Passed => "passed",
    Failed => "failed",
    Cancelled => "cancelled",
});

text_enum!(
    /// Stored payment state. `overdue` is never stored; see [`payment_state`].
    PaymentStatus {
        Pending => "pending",
        Paid => "paid",
        Cancelled => "cancelled",
    }
);

text_enum!(
    /// Coarse account role used for route gating.
    Role {
        Admin => "admin",
        Instructor => "instructor",
        Student => "student",
    }
);

impl Role {
    /// Admins and instructors run the day-to-day console.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Instructor)
    }
}

/// Display state of a payment as of `today` (`YYYY-MM-DD`).
/// Pending payments whose due date has passed read as "overdue".
pub fn payment_state(status: &str, due_date: &str, today: &str) -> &'static str {
    match status.parse::<PaymentStatus>() {
        Ok(PaymentStatus::Pending) if due_date < today => "overdue",
        Ok(s) => s.as_str(),
        Err(_) => "pending",
    }
}

/// Parse `value` as `T` or produce a validation message naming `field`.
pub fn parse_field<T: FromStr<Err = String>>(field: &str, value: &str) -> Result<T, String> {
    value.parse::<T>().map_err(|e| format!("{}: {}", field, e))
}
