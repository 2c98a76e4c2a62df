// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL storage providers backed by a connection pool.
//!
//! Datasets and work packages are stored as one row each with their file
//! collections as JSONB documents, so an upsert replaces the whole record
//! and the announced file order survives.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use thiserror::Error;

use wpsbackend::storage_provider_trait::{DatasetStorageProvider, WorkPackageStorageProvider};
use wpsbackend::work_package::WorkPackage;
use wpstypes::dataset::{Dataset, DatasetFile, WorkType};
use wpstypes::identifiers::WorkPackageId;
use wpstypes::time::TimeStamp;

use crate::configurations::DatabaseSettings;

#[derive(Debug, Error)]
pub enum PostgresStorageError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    /// A stored document could not be mapped back onto the model.
    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

/// Storage provider for datasets and work packages using PostgreSQL.
#[derive(Clone)]
pub struct PostgresStorageProvider {
    pool: PgPool,
}

impl PostgresStorageProvider {
    /// Connect to the configured database, creating and migrating it if
    /// necessary.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, sqlx::Error> {
        let mut connection =
            PgConnection::connect(settings.connection_string_without_database().expose_secret())
                .await?;
        let db_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT datname FROM pg_catalog.pg_database WHERE datname = $1)",
        )
        .bind(&settings.database_name)
        .fetch_one(&mut connection)
        .await?;
        if !db_exists {
            connection
                .execute(format!(r#"CREATE DATABASE "{}";"#, settings.database_name).as_str())
                .await?;
        }
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(settings.timeout_secs))
            .connect(settings.connection_string().expose_secret())
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl DatasetStorageProvider for PostgresStorageProvider {
    type StorageError = PostgresStorageError;

    async fn upsert_dataset(&self, dataset: Dataset) -> Result<(), PostgresStorageError> {
        let files = serde_json::to_value(&dataset.files)
            .map_err(|error| PostgresStorageError::Corrupted(error.to_string()))?;
        sqlx::query(
            "INSERT INTO datasets (id, title, description, stage, files)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 description = EXCLUDED.description,
                 stage = EXCLUDED.stage,
                 files = EXCLUDED.files",
        )
        .bind(&dataset.id)
        .bind(&dataset.title)
        .bind(&dataset.description)
        .bind(dataset.stage.to_string())
        .bind(files)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), PostgresStorageError> {
        sqlx::query("DELETE FROM datasets WHERE id = $1")
            .bind(dataset_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_dataset(
        &self,
        dataset_id: &str,
    ) -> Result<Option<Dataset>, PostgresStorageError> {
        let row: Option<(String, String, Option<String>, String, serde_json::Value)> =
            sqlx::query_as(
                "SELECT id, title, description, stage, files FROM datasets WHERE id = $1",
            )
            .bind(dataset_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some((id, title, description, stage, files)) = row else {
            return Ok(None);
        };
        let stage: WorkType = stage
            .parse()
            .map_err(|_| PostgresStorageError::Corrupted(format!("unknown stage {stage}")))?;
        let files: Vec<DatasetFile> = serde_json::from_value(files)
            .map_err(|error| PostgresStorageError::Corrupted(error.to_string()))?;
        Ok(Some(Dataset {
            id,
            title,
            description,
            stage,
            files,
        }))
    }
}

#[async_trait]
impl WorkPackageStorageProvider for PostgresStorageProvider {
    type StorageError = PostgresStorageError;

    async fn insert_work_package(
        &self,
        work_package: WorkPackage,
    ) -> Result<(), PostgresStorageError> {
        let file_ids = serde_json::to_value(&work_package.file_ids)
            .map_err(|error| PostgresStorageError::Corrupted(error.to_string()))?;
        sqlx::query(
            "INSERT INTO work_packages (id, dataset_id, work_type, user_id,
                 user_public_crypt4gh_key, full_user_name, email, file_ids,
                 token_hash, created, expires)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&work_package.id)
        .bind(&work_package.dataset_id)
        .bind(work_package.work_type.to_string())
        .bind(&work_package.user_id)
        .bind(&work_package.user_public_crypt4gh_key)
        .bind(&work_package.full_user_name)
        .bind(&work_package.email)
        .bind(file_ids)
        .bind(&work_package.token_hash)
        .bind(work_package.created)
        .bind(work_package.expires)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_work_package(
        &self,
        id: &WorkPackageId,
    ) -> Result<Option<WorkPackage>, PostgresStorageError> {
        type Row = (
            WorkPackageId,
            String,
            String,
            String,
            String,
            String,
            String,
            serde_json::Value,
            String,
            TimeStamp,
            TimeStamp,
        );
        let row: Option<Row> = sqlx::query_as(
            "SELECT id, dataset_id, work_type, user_id, user_public_crypt4gh_key,
                 full_user_name, email, file_ids, token_hash, created, expires
             FROM work_packages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some((
            id,
            dataset_id,
            work_type,
            user_id,
            user_public_crypt4gh_key,
            full_user_name,
            email,
            file_ids,
            token_hash,
            created,
            expires,
        )) = row
        else {
            return Ok(None);
        };
        let work_type: WorkType = work_type
            .parse()
            .map_err(|_| PostgresStorageError::Corrupted(format!("unknown work type {work_type}")))?;
        let file_ids: Vec<String> = serde_json::from_value(file_ids)
            .map_err(|error| PostgresStorageError::Corrupted(error.to_string()))?;
        Ok(Some(WorkPackage {
            id,
            dataset_id,
            work_type,
            user_id,
            user_public_crypt4gh_key,
            full_user_name,
            email,
            file_ids,
            token_hash,
            created,
            expires,
        }))
    }
}
