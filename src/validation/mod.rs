//! Request field rules, one static table per input type.
//!
//! Runs at the transport edge before anything reaches the services.
//! Failures are reported per field, first failing constraint wins.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$")
        .unwrap()
});
static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z\t\n\x0C\r ]+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Required,
    Email,
    /// 2 to 50 characters, ASCII letters and whitespace only.
    Name,
    /// At least 8 characters with a letter and a digit.
    StrongPassword,
    MaxLen(usize),
}

impl Constraint {
    fn holds(&self, value: &str) -> bool {
        match self {
            Constraint::Required => !value.trim().is_empty(),
            Constraint::Email => EMAIL_REGEX.is_match(value.trim()),
            Constraint::Name => {
                (2..=50).contains(&value.chars().count()) && NAME_REGEX.is_match(value)
            }
            Constraint::StrongPassword => {
                value.chars().count() >= 8
                    && value.chars().any(|c| c.is_ascii_alphabetic())
                    && value.chars().any(|c| c.is_ascii_digit())
            }
            Constraint::MaxLen(max) => value.chars().count() <= *max,
        }
    }
}

pub struct FieldRule {
    pub field: &'static str,
    pub checks: &'static [(Constraint, &'static str)],
}

pub type FieldErrors = BTreeMap<&'static str, &'static str>;

pub trait Validate {
    const RULES: &'static [FieldRule];

    fn field(&self, name: &str) -> &str;

    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for rule in Self::RULES {
            let value = self.field(rule.field);
            if let Some((_, message)) = rule.checks.iter().find(|(c, _)| !c.holds(value)) {
                errors.insert(rule.field, message);
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

pub const LOGIN_RULES: &[FieldRule] = &[
    FieldRule {
        field: "email",
        checks: &[
            (Constraint::Required, "email is required"),
            (Constraint::Email, "invalid email address"),
        ],
    },
    FieldRule {
        field: "password",
        checks: &[
            (Constraint::Required, "password is required"),
            (Constraint::MaxLen(1024), "password must be at most 1024 characters"),
        ],
    },
];

pub const REFRESH_RULES: &[FieldRule] = &[FieldRule {
    field: "refresh_token",
    checks: &[
        (Constraint::Required, "refresh_token is required"),
        (Constraint::MaxLen(256), "refresh_token must be at most 256 characters"),
    ],
}];

pub const REGISTER_RULES: &[FieldRule] = &[
    FieldRule {
        field: "name",
        checks: &[
            (Constraint::Required, "name is required"),
            (Constraint::Name, "must be 2-50 characters, letters and spaces only"),
        ],
    },
    FieldRule {
        field: "email",
        checks: &[
            (Constraint::Required, "email is required"),
            (Constraint::Email, "invalid email address"),
            (Constraint::MaxLen(255), "email must be at most 255 characters"),
        ],
    },
    FieldRule {
        field: "password",
        checks: &[
            (Constraint::Required, "password is required"),
            (Constraint::StrongPassword, "min 8 chars with at least 1 letter and 1 number"),
            (Constraint::MaxLen(1024), "password must be at most 1024 characters"),
        ],
    },
];

pub const REVOKE_SESSIONS_RULES: &[FieldRule] = &[FieldRule {
    field: "user_id",
    checks: &[(Constraint::Required, "user_id is required")],
}];
