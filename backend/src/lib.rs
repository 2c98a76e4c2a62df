// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! Core logic of the work package service.
//!
//! The [`work_package::WorkPackageRepository`] orchestrates everything: it
//! authenticates callers, consults the access API, reads the dataset
//! projection, mints and encrypts tokens and persists verifier-only
//! records. Storage and the access API sit behind narrow traits so that
//! drivers stay swappable.

pub mod access;
pub mod auth;
pub mod dataset_events;
pub mod storage_provider_trait;
pub mod work_package;
