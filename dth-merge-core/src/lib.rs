#![doc = "dth-merge-core: core logic library for dth-merge."]

//! This crate contains the merge-and-normalize pipeline for the monthly DTH
//! spreadsheet exports, the data model it works on, and the collaborator
//! traits ([`contract::FileSource`], [`contract::Uploader`]) behind which the
//! remote store lives.
//!
//! # Usage
//! The CLI crate builds a [`config::MergeConfig`], provides a concrete
//! remote-store client and calls [`pipeline::merge`].

pub mod combine;
pub mod config;
pub mod contract;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod pipeline;
pub mod select;
pub mod sink;
pub mod table;
