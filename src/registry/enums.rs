//! The enum registry: source of truth for "type" semantics.
//!
//! Each entity kind with a type table has a closed [`EnumId`] discriminant
//! and a static member table carrying the human metadata (comment, default
//! flag, optional JSON payload). Members are append-only: shipped names and
//! their meaning never change, new members may be added at the end.

use std::fmt;

/// A single enumerated value as authored at schema-design time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumMember {
    /// Uppercase member name, e.g. `NOTE`. Projected verbatim into the type
    /// row's `name` and `type_enum` columns.
    pub name: &'static str,
    /// Human description, projected into the type row's `description`.
    pub comment: &'static str,
    /// At most one member per enum carries the default flag.
    pub is_default: bool,
    /// Optional JSON payload (e.g. a form schema); `{}` when absent.
    pub payload: Option<&'static str>,
}

/// Closed set of enum identifiers, one per type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumId {
    BusinessPartnerType,
    InvoiceType,
    EventType,
    RequestType,
    TagType,
    AddressType,
    ItemType,
    ProjectType,
}

const BUSINESS_PARTNER_TYPES: &[EnumMember] = &[
    EnumMember {
        name: "ORGANIZATION",
        comment: "A company, non-profit, or other organization",
        is_default: true,
        payload: None,
    },
    EnumMember {
        name: "INDIVIDUAL",
        comment: "A natural person",
        is_default: false,
        payload: None,
    },
    EnumMember {
        name: "GROUP",
        comment: "An informal group of partners",
        is_default: false,
        payload: None,
    },
];

const INVOICE_TYPES: &[EnumMember] = &[
    EnumMember {
        name: "STANDARD",
        comment: "Customer or vendor invoice",
        is_default: true,
        payload: None,
    },
    EnumMember {
        name: "CREDIT_MEMO",
        comment: "Negative invoice reversing a prior charge",
        is_default: false,
        payload: None,
    },
    EnumMember {
        name: "PROFORMA",
        comment: "Draft invoice issued before delivery",
        is_default: false,
        payload: None,
    },
];

const EVENT_TYPES: &[EnumMember] = &[
    EnumMember {
        name: "NOTE",
        comment: "Free-form note attached to a record",
        is_default: true,
        payload: None,
    },
    EnumMember {
        name: "ACTION",
        comment: "Something that was done",
        is_default: false,
        payload: None,
    },
    EnumMember {
        name: "TODO",
        comment: "Something that needs to be done",
        is_default: false,
        payload: None,
    },
];

const REQUEST_TYPES: &[EnumMember] = &[
    EnumMember {
        name: "NOTE",
        comment: "Informational request",
        is_default: true,
        payload: None,
    },
    EnumMember {
        name: "ACTION",
        comment: "Request for work to be performed",
        is_default: false,
        payload: None,
    },
    EnumMember {
        name: "APPROVAL",
        comment: "Request for sign-off",
        is_default: false,
        payload: None,
    },
];

const TAG_TYPES: &[EnumMember] = &[
    EnumMember {
        name: "NONE",
        comment: "Plain label with no structured payload",
        is_default: true,
        payload: None,
    },
    EnumMember {
        name: "CONTACT",
        comment: "Contact person details",
        is_default: false,
        payload: None,
    },
    EnumMember {
        name: "EMAIL",
        comment: "Email address",
        is_default: false,
        payload: Some(r#"{"json_schema": {"email": "text"}}"#),
    },
    EnumMember {
        name: "PHONE",
        comment: "Phone number",
        is_default: false,
        payload: Some(r#"{"json_schema": {"phone": "text"}}"#),
    },
];

const ADDRESS_TYPES: &[EnumMember] = &[
    EnumMember {
        name: "MAILING",
        comment: "Postal mailing address",
        is_default: true,
        payload: Some(
            r#"{"json_schema": {"street": "text", "city": "text", "postal": "text", "country": "text"}}"#,
        ),
    },
    EnumMember {
        name: "SHIPPING",
        comment: "Physical delivery address",
        is_default: false,
        payload: None,
    },
    EnumMember {
        name: "BILLING",
        comment: "Invoice delivery address",
        is_default: false,
        payload: None,
    },
];

const ITEM_TYPES: &[EnumMember] = &[
    EnumMember {
        name: "SERVICE",
        comment: "Billable service",
        is_default: true,
        payload: None,
    },
    EnumMember {
        name: "PRODUCT",
        comment: "Physical or digital good",
        is_default: false,
        payload: None,
    },
    EnumMember {
        name: "CHARGE",
        comment: "Fee, surcharge, or other non-inventory charge",
        is_default: false,
        payload: None,
    },
];

const PROJECT_TYPES: &[EnumMember] = &[
    EnumMember {
        name: "CLIENT",
        comment: "Work performed for a business partner",
        is_default: true,
        payload: None,
    },
    EnumMember {
        name: "INTERNAL",
        comment: "Internal initiative",
        is_default: false,
        payload: None,
    },
    EnumMember {
        name: "MAINTENANCE",
        comment: "Ongoing support and upkeep",
        is_default: false,
        payload: None,
    },
];

impl EnumId {
    pub const ALL: [EnumId; 8] = [
        EnumId::BusinessPartnerType,
        EnumId::InvoiceType,
        EnumId::EventType,
        EnumId::RequestType,
        EnumId::TagType,
        EnumId::AddressType,
        EnumId::ItemType,
        EnumId::ProjectType,
    ];

    /// The type table this enum is projected into.
    pub fn type_table(self) -> &'static str {
        match self {
            EnumId::BusinessPartnerType => "business_partner_type",
            EnumId::InvoiceType => "invoice_type",
            EnumId::EventType => "event_type",
            EnumId::RequestType => "request_type",
            EnumId::TagType => "tag_type",
            EnumId::AddressType => "address_type",
            EnumId::ItemType => "item_type",
            EnumId::ProjectType => "project_type",
        }
    }

    /// Fixed naming convention: a type table named `<entity>_type` maps back
    /// to its enum identifier.
    pub fn from_type_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.type_table() == table)
    }

    pub fn members(self) -> &'static [EnumMember] {
        match self {
            EnumId::BusinessPartnerType => BUSINESS_PARTNER_TYPES,
            EnumId::InvoiceType => INVOICE_TYPES,
            EnumId::EventType => EVENT_TYPES,
            EnumId::RequestType => REQUEST_TYPES,
            EnumId::TagType => TAG_TYPES,
            EnumId::AddressType => ADDRESS_TYPES,
            EnumId::ItemType => ITEM_TYPES,
            EnumId::ProjectType => PROJECT_TYPES,
        }
    }

    /// The member flagged as default, if the enum declares one.
    pub fn default_member(self) -> Option<&'static EnumMember> {
        self.members().iter().find(|m| m.is_default)
    }
}

impl fmt::Display for EnumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_table())
    }
}

/// Derives a type row's search key from a member name:
/// uppercase/underscore becomes lowercase/hyphen (`CREDIT_MEMO` →
/// `credit-memo`).
pub fn kebab_case(member_name: &str) -> String {
    member_name
        .chars()
        .map(|c| if c == '_' { '-' } else { c.to_ascii_lowercase() })
        .collect()
}
