use async_trait::async_trait;
use log::{debug, info};
use sqlx::postgres::{PgConnectOptions, PgConnection, Postgres};
use sqlx::{Connection, QueryBuilder};
use std::str::FromStr;

use crate::args::Credentials;
use crate::config::Settings;
use crate::db::models::{DeploymentId, ProcedureResultRow, RemoteCallResult, WorkflowFile};
use crate::db::{Connector, DeployerApi};
use crate::errors::{DeployerError, DeployerResult};

/// SQL text for the objects of the deployer API
///
/// Names come from validated [`Settings`], so splicing them is safe.
#[derive(Debug, Clone)]
pub struct ApiStatements {
    schema: String,
    staging_table: String,
}

impl ApiStatements {
    pub fn new(schema: impl Into<String>, staging_table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            staging_table: staging_table.into(),
        }
    }

    pub fn purge(&self) -> String {
        format!(
            "SELECT code_result, text_message FROM {}.purge_workflow_file()",
            self.schema
        )
    }

    pub fn deployment_id(&self) -> String {
        format!("SELECT {}.get_id_deployment()", self.schema)
    }

    /// Statement head for the multi-row insert, values are appended per batch
    pub fn insert_files(&self) -> String {
        format!(
            "INSERT INTO {} (id_deployment, name_workflow_file, text_workflow, dtime_inserted, user_inserted) ",
            self.staging_table
        )
    }

    pub fn convert(&self) -> String {
        format!(
            "SELECT code_result, text_message FROM {}.convert_workflow_file2xmltype($1)",
            self.schema
        )
    }

    pub fn validate(&self) -> String {
        format!(
            "SELECT code_result, text_message FROM {}.validate_workflow($1)",
            self.schema
        )
    }

    pub fn deploy(&self) -> String {
        format!(
            "SELECT code_result, text_message FROM {}.deploy_workflow($1, $2)",
            self.schema
        )
    }
}

/// Opens PostgreSQL connections for a deployment run
pub struct PgConnector {
    statements: ApiStatements,
    application_name: String,
    batch_size: usize,
}

impl PgConnector {
    /// Fails on settings that [`Settings::validate`] rejects
    pub fn new(settings: &Settings) -> DeployerResult<Self> {
        settings.validate()?;
        Ok(Self {
            statements: ApiStatements::new(&settings.api_schema, &settings.staging_table),
            application_name: settings.application_name.clone(),
            batch_size: settings.insert_batch_size,
        })
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Api = PgDeployerApi;

    async fn connect(&self, credentials: &Credentials) -> DeployerResult<PgDeployerApi> {
        let options = PgConnectOptions::from_str(&credentials.connection_url)
            .map_err(|e| {
                DeployerError::Connection(format!(
                    "invalid connection string {}: {}",
                    credentials.display_url(),
                    e
                ))
            })?
            .username(&credentials.user_name)
            .password(&credentials.password)
            .application_name(&self.application_name);

        let mut conn = PgConnection::connect_with(&options).await.map_err(|e| {
            DeployerError::Connection(format!("{}: {}", credentials.display_url(), e))
        })?;

        let database = sqlx::query_scalar::<_, String>("SELECT current_database()::text")
            .fetch_one(&mut conn)
            .await
            .map_err(|e| DeployerError::Connection(e.to_string()))?;

        info!(
            "Connected to the database {} using URL {}.",
            database,
            credentials.display_url()
        );

        Ok(PgDeployerApi {
            conn,
            statements: self.statements.clone(),
            batch_size: self.batch_size,
        })
    }
}

/// Deployer API over one PostgreSQL connection
pub struct PgDeployerApi {
    conn: PgConnection,
    statements: ApiStatements,
    batch_size: usize,
}

impl PgDeployerApi {
    async fn call_status(&mut self, sql: &str) -> DeployerResult<RemoteCallResult> {
        let row = sqlx::query_as::<_, ProcedureResultRow>(sql)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(row.into())
    }

    async fn call_status_for(
        &mut self,
        sql: &str,
        deployment: DeploymentId,
    ) -> DeployerResult<RemoteCallResult> {
        let row = sqlx::query_as::<_, ProcedureResultRow>(sql)
            .bind(deployment)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl DeployerApi for PgDeployerApi {
    async fn purge_workflow_files(&mut self) -> DeployerResult<RemoteCallResult> {
        let sql = self.statements.purge();
        self.call_status(&sql).await
    }

    async fn next_deployment_id(&mut self) -> DeployerResult<DeploymentId> {
        let id = sqlx::query_scalar::<_, Option<DeploymentId>>(&self.statements.deployment_id())
            .fetch_one(&mut self.conn)
            .await?;

        id.ok_or_else(|| DeployerError::Protocol("get_id_deployment returned NULL".to_string()))
    }

    async fn insert_workflow_files(
        &mut self,
        deployment: DeploymentId,
        files: &[WorkflowFile],
        user_name: &str,
    ) -> DeployerResult<u64> {
        let head = self.statements.insert_files();
        let mut tx = self.conn.begin().await?;
        let mut inserted = 0;

        for batch in files.chunks(self.batch_size) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(head.as_str());
            builder.push_values(batch, |mut row, file| {
                row.push_bind(deployment)
                    .push_bind(file.name.as_str())
                    .push_bind(file.text.as_str())
                    .push("now()")
                    .push_bind(user_name);
            });

            let result = builder.build().execute(&mut *tx).await?;
            debug!("Inserted batch of {} workflow files", result.rows_affected());
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn convert_workflow_files(
        &mut self,
        deployment: DeploymentId,
    ) -> DeployerResult<RemoteCallResult> {
        let sql = self.statements.convert();
        self.call_status_for(&sql, deployment).await
    }

    async fn validate_workflow(
        &mut self,
        deployment: DeploymentId,
    ) -> DeployerResult<RemoteCallResult> {
        let sql = self.statements.validate();
        self.call_status_for(&sql, deployment).await
    }

    async fn deploy_workflow(
        &mut self,
        deployment: DeploymentId,
        description: &str,
    ) -> DeployerResult<RemoteCallResult> {
        let row = sqlx::query_as::<_, ProcedureResultRow>(&self.statements.deploy())
            .bind(deployment)
            .bind(description)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(row.into())
    }

    async fn close(self) -> DeployerResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}
