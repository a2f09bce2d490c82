//! Cross-node scenarios.

mod delegation;
mod groups;
mod live;
