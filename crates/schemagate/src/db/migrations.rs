//! Compiled-in CMS migration plan
//!
//! Each migration is plain `CREATE TABLE` DDL (no `IF NOT EXISTS`), so a
//! table that already exists surfaces as a schema conflict instead of being
//! silently skipped.

use schemagate_core::{MigrationDescriptor, MigrationSet, Result};

/// One compiled-in migration.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    /// Tables this migration creates
    pub tables: &'static [&'static str],
    pub script: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        id: "20240101000000_InitialCreate",
        tables: &["Sites", "Pages", "Modules"],
        script: r#"
CREATE TABLE "Sites" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "Name" TEXT NOT NULL,
    "HostName" TEXT NOT NULL UNIQUE,
    "CreatedAt" TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE "Pages" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "SiteId" INTEGER NOT NULL REFERENCES "Sites"("Id") ON DELETE CASCADE,
    "ParentId" INTEGER REFERENCES "Pages"("Id"),
    "Slug" TEXT NOT NULL,
    "Title" TEXT NOT NULL,
    "IsPublished" INTEGER NOT NULL DEFAULT 0,
    UNIQUE ("SiteId", "Slug")
);

CREATE TABLE "Modules" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "PageId" INTEGER NOT NULL REFERENCES "Pages"("Id") ON DELETE CASCADE,
    "Kind" TEXT NOT NULL,
    "Position" INTEGER NOT NULL DEFAULT 0,
    "Settings" TEXT
);
"#,
    },
    Migration {
        id: "20240115000000_AddIdentity",
        tables: &["AspNetUsers", "AspNetRoles", "AspNetUserRoles"],
        script: r#"
CREATE TABLE "AspNetUsers" (
    "Id" TEXT PRIMARY KEY NOT NULL,
    "UserName" TEXT,
    "NormalizedUserName" TEXT UNIQUE,
    "Email" TEXT,
    "NormalizedEmail" TEXT,
    "EmailConfirmed" INTEGER NOT NULL DEFAULT 0,
    "PasswordHash" TEXT,
    "SecurityStamp" TEXT,
    "LockoutEnd" TEXT,
    "AccessFailedCount" INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE "AspNetRoles" (
    "Id" TEXT PRIMARY KEY NOT NULL,
    "Name" TEXT,
    "NormalizedName" TEXT UNIQUE
);

CREATE TABLE "AspNetUserRoles" (
    "UserId" TEXT NOT NULL REFERENCES "AspNetUsers"("Id") ON DELETE CASCADE,
    "RoleId" TEXT NOT NULL REFERENCES "AspNetRoles"("Id") ON DELETE CASCADE,
    PRIMARY KEY ("UserId", "RoleId")
);
"#,
    },
    Migration {
        id: "20240201000000_AddThemes",
        tables: &["Themes"],
        script: r#"
CREATE TABLE "Themes" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "SiteId" INTEGER NOT NULL REFERENCES "Sites"("Id") ON DELETE CASCADE,
    "Name" TEXT NOT NULL,
    "IsActive" INTEGER NOT NULL DEFAULT 0,
    "Stylesheet" TEXT
);
"#,
    },
    Migration {
        id: "20240301000000_AddBilling",
        tables: &["Subscriptions", "Invoices"],
        script: r#"
CREATE TABLE "Subscriptions" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "SiteId" INTEGER NOT NULL REFERENCES "Sites"("Id") ON DELETE CASCADE,
    "Plan" TEXT NOT NULL,
    "Status" TEXT NOT NULL,
    "RenewsAt" TEXT
);

CREATE TABLE "Invoices" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "SubscriptionId" INTEGER NOT NULL REFERENCES "Subscriptions"("Id") ON DELETE CASCADE,
    "AmountCents" INTEGER NOT NULL,
    "Currency" TEXT NOT NULL DEFAULT 'USD',
    "IssuedAt" TEXT NOT NULL DEFAULT (datetime('now')),
    "PaidAt" TEXT
);
"#,
    },
    Migration {
        id: "20240401000000_AddPageVersions",
        tables: &["PageVersions"],
        script: r#"
CREATE TABLE "PageVersions" (
    "Id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "PageId" INTEGER NOT NULL REFERENCES "Pages"("Id") ON DELETE CASCADE,
    "Version" INTEGER NOT NULL,
    "Content" TEXT NOT NULL,
    "AuthorId" TEXT REFERENCES "AspNetUsers"("Id"),
    "CreatedAt" TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE ("PageId", "Version")
);
"#,
    },
];

/// The plan as the sequencer sees it.
///
/// # Errors
///
/// Returns error if the compiled-in plan is out of order or names an
/// invalid table.
pub fn migration_set() -> Result<MigrationSet> {
    MIGRATIONS
        .iter()
        .map(|m| MigrationDescriptor::new(m.id, m.tables))
        .collect::<Result<Vec<_>>>()
        .and_then(MigrationSet::new)
}
