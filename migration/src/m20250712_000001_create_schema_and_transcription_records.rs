use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE SCHEMA IF NOT EXISTS call_insights")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("ALTER SCHEMA call_insights OWNER TO call_insights")
            .await?;

        // The durable results store. At most one row per contact_id; the
        // unique index backs the pipeline's ON CONFLICT upsert.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE TABLE call_insights.transcription_records (
                    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                    contact_id varchar(255) NOT NULL,
                    agent varchar(255),
                    initiation_timestamp timestamptz NOT NULL,
                    queue_name varchar(255),
                    disposition_title varchar(255),
                    campaign_name varchar(255),
                    customer_line varchar(64),
                    call_duration_minutes integer,
                    call_duration_seconds integer,
                    transcript_text text,
                    speaker_data text,
                    sentiment_analysis text,
                    entities text,
                    call_summary text,
                    primary_category varchar(64),
                    categories text,
                    satisfaction_score double precision,
                    created_at timestamptz NOT NULL DEFAULT now(),
                    updated_at timestamptz NOT NULL DEFAULT now()
                )",
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "ALTER TABLE call_insights.transcription_records OWNER TO call_insights",
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX transcription_records_contact_id_idx
                    ON call_insights.transcription_records (contact_id)",
            )
            .await?;

        // Dashboard listings are always date-range scoped, newest first
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX transcription_records_initiation_timestamp_idx
                    ON call_insights.transcription_records (initiation_timestamp DESC)",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS call_insights.transcription_records")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP SCHEMA IF EXISTS call_insights")
            .await?;

        Ok(())
    }
}
