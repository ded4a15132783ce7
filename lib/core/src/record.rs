//! Identity records
//!
//! A record is four optional free-text fields. Any subset may be absent and
//! an empty string is treated the same as a missing value everywhere.

use serde::{Deserialize, Serialize};

/// A partial, possibly noisy description of a person
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl IdentityRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Field value as `&str`, `""` when absent
    #[inline]
    pub fn field(&self, field: Field) -> &str {
        let value = match field {
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Phone => &self.phone,
            Field::Address => &self.address,
        };
        value.as_deref().unwrap_or("")
    }

    #[inline]
    pub fn name_str(&self) -> &str {
        self.field(Field::Name)
    }

    #[inline]
    pub fn email_str(&self) -> &str {
        self.field(Field::Email)
    }

    #[inline]
    pub fn phone_str(&self) -> &str {
        self.field(Field::Phone)
    }

    #[inline]
    pub fn address_str(&self) -> &str {
        self.field(Field::Address)
    }

    /// True if no field carries a non-empty value
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.field(*f).is_empty())
    }
}

/// The four comparable fields of an [`IdentityRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Email,
    Name,
    Phone,
    Address,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Email, Field::Name, Field::Phone, Field::Address];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Email => "email",
            Field::Name => "name",
            Field::Phone => "phone",
            Field::Address => "address",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
