//! The fixed attachment field schema.
//!
//! The same list drives the query's select clause and the ledger columns, so
//! a ledger row always has exactly the fields the query asked for.

/// Fields selected for every record, in ledger column order.
pub const ATTACHMENT_FIELDS: [&str; 14] = [
    "BodyLength",
    "ContentType",
    "CreatedById",
    "CreatedDate",
    "Description",
    "Id",
    "IsDeleted",
    "IsPrivate",
    "LastModifiedById",
    "LastModifiedDate",
    "Name",
    "OwnerId",
    "ParentId",
    "SystemModstamp",
];

pub const ID: &str = "Id";
pub const CREATED_DATE: &str = "CreatedDate";
pub const BODY_LENGTH: &str = "BodyLength";
pub const NAME: &str = "Name";
