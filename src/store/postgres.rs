use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::delivery_record::{DeliveryRecord, DeliveryStatus, NewDeliveryRecord};
use crate::models::message::{Message, NewMessage};
use crate::models::subscriber::Subscriber;
use crate::store::{DeliveryStore, MessageStore, SubscriberStore};

#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(&self, new: NewMessage) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO mensajes (contenido, categoria, estado, programado_para, recurrencia, plantilla_id, enviado_en)
            VALUES ($1, $2, $3, $4, $5, $6, NULL)
            RETURNING *
            "#,
        )
        .bind(&new.contenido)
        .bind(new.categoria)
        .bind(new.estado)
        .bind(new.programado_para)
        .bind(new.recurrencia)
        .bind(new.plantilla_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM mensajes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(message)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM mensajes
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn due_scheduled(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM mensajes
            WHERE estado = 'programado' AND programado_para <= $1
            ORDER BY programado_para ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool> {
        // First writer to flip the state wins; a concurrent dispatch observes
        // zero affected rows and skips.
        let result = sqlx::query(
            r#"
            UPDATE mensajes
            SET estado = 'enviado', enviado_en = $2, updated_at = NOW()
            WHERE id = $1 AND estado IN ('borrador', 'programado')
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE mensajes
            SET estado = 'fallido', updated_at = NOW()
            WHERE id = $1 AND estado = 'programado'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Clone)]
pub struct PgSubscriberStore {
    pool: PgPool,
}

impl PgSubscriberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberStore for PgSubscriberStore {
    async fn upsert_active(&self, telefono: &str, nombre: Option<&str>) -> Result<Subscriber> {
        let subscriber = sqlx::query_as::<_, Subscriber>(
            r#"
            INSERT INTO suscriptores (telefono, nombre, activo)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (telefono) DO UPDATE
                SET activo = TRUE,
                    nombre = COALESCE(EXCLUDED.nombre, suscriptores.nombre),
                    updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(telefono)
        .bind(nombre)
        .fetch_one(&self.pool)
        .await?;

        Ok(subscriber)
    }

    async fn deactivate(&self, telefono: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE suscriptores
            SET activo = FALSE, updated_at = NOW()
            WHERE telefono = $1
            "#,
        )
        .bind(telefono)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn active(&self) -> Result<Vec<Subscriber>> {
        let subscribers = sqlx::query_as::<_, Subscriber>(
            r#"
            SELECT * FROM suscriptores
            WHERE activo = TRUE
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(subscribers)
    }

    async fn list(&self) -> Result<Vec<Subscriber>> {
        let subscribers =
            sqlx::query_as::<_, Subscriber>("SELECT * FROM suscriptores ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(subscribers)
    }
}

#[derive(Clone)]
pub struct PgDeliveryStore {
    pool: PgPool,
}

impl PgDeliveryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryStore for PgDeliveryStore {
    async fn insert_many(&self, records: Vec<NewDeliveryRecord>) -> Result<()> {
        // Rosters are modest (tens to low thousands); row-at-a-time keeps the
        // ON CONFLICT re-dispatch tolerance straightforward.
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO registro_envios
                    (mensaje_id, suscriptor_id, estado, whatsapp_message_id, error_mensaje)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (mensaje_id, suscriptor_id) DO NOTHING
                "#,
            )
            .bind(record.mensaje_id)
            .bind(record.suscriptor_id)
            .bind(record.estado)
            .bind(&record.whatsapp_message_id)
            .bind(&record.error_mensaje)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Option<DeliveryRecord>> {
        let record = sqlx::query_as::<_, DeliveryRecord>(
            "SELECT * FROM registro_envios WHERE whatsapp_message_id = $1",
        )
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_status(
        &self,
        id: Uuid,
        estado: DeliveryStatus,
        provider_status: &str,
        error_mensaje: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE registro_envios
            SET estado = $2,
                whatsapp_status = $3,
                error_mensaje = COALESCE($4, error_mensaje),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(estado)
        .bind(provider_status)
        .bind(error_mensaje)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn for_message(&self, mensaje_id: Uuid) -> Result<Vec<DeliveryRecord>> {
        let records = sqlx::query_as::<_, DeliveryRecord>(
            r#"
            SELECT * FROM registro_envios
            WHERE mensaje_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(mensaje_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
