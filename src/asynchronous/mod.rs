// src/asynchronous/mod.rs

//! Graph nodes whose values are futures.
//!
//! A [`Pending`] is a shareable future of a value. Async computables store a
//! `Pending` produced from a [`Snapshot`](crate::graph::Snapshot) of their
//! children; [`AsyncCell`] serialises writes so that every write is observed
//! in the order it was issued, however late its future resolves.

mod cell;
mod computable;
mod pending;

pub use cell::AsyncCell;
pub use pending::{AsyncResult, Pending};
