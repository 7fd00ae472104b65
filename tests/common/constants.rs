//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When fixture data changes (keys, paths, entity codes), update only this file.

// ============================================================================
// API Keys
// ============================================================================

/// Plaintext of the L1 key owned by `reader`
pub const PUBLIC_KEY: &str = "mcpk_testpublic0000000000000000000000000000000";

/// Plaintext of the L2 key owned by `staff`
pub const INTERNAL_KEY: &str = "mcpk_testinternal000000000000000000000000000000";

/// Plaintext of the L3 key owned by `analyst`
pub const CONFIDENTIAL_KEY: &str = "mcpk_testconfidential00000000000000000000000000";

/// Plaintext of the only L4 key, owned by `admin`
pub const ADMIN_KEY: &str = "mcpk_testadmin000000000000000000000000000000000";

pub const PUBLIC_OWNER: &str = "reader";
pub const INTERNAL_OWNER: &str = "staff";
pub const CONFIDENTIAL_OWNER: &str = "analyst";
pub const ADMIN_OWNER: &str = "admin";

// ============================================================================
// Knowledge Fixtures
// ============================================================================

/// L1 file in the billing domain, two chunks in module "Invoicing"
pub const INVOICES_PATH: &str = "billing/invoices.md";

/// L3 file in the billing domain, updated long ago
pub const LEDGER_PATH: &str = "billing/ledger.md";

/// L2 file in the hr domain, one chunk without a module
pub const POLICIES_PATH: &str = "hr/policies.md";

pub const BILLING_DOMAIN: &str = "billing";
pub const HR_DOMAIN: &str = "hr";

pub const INVOICE_ENTITY: &str = "INV-1";
pub const CUSTOMER_ENTITY: &str = "CUST-1";
pub const LEDGER_ENTITY: &str = "LED-1";
/// Known entity with no edges and no chunk references
pub const EMPLOYEE_ENTITY: &str = "EMP-1";
/// Only ever appears as an edge target
pub const PAYMENT_ENTITY: &str = "PAY-1";

/// Number of audit rows seeded before any test request
pub const SEEDED_AUDIT_ROWS: usize = 3;

// ============================================================================
// Timing
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between server readiness checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Default timeout for HTTP requests in tests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
