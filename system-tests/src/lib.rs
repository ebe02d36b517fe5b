// system-tests/src/lib.rs
// ============================================================================
// Module: Forum E2E System Tests Library
// Description: Crate root for the end-to-end harness test binaries.
// Purpose: Anchor the system-tests package; all logic lives in tests/.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The system-tests binaries in `system-tests/tests` exercise the harness
//! client against in-process stubs of the forum server. Shared stubs and
//! fixtures live under `tests/helpers`; this library target is intentionally
//! empty.
