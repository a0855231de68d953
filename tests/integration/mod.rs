//! Integration tests for contexts, engines and event loops


mod engine_selection;
mod event_loops;
mod gpg_process;
mod interactive_ops;
mod sign_ops;
mod trustlist_ops;
