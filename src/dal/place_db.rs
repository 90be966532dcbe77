use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::import::PlaceRow;

/// Probes for the `active`/`source` columns before any mutation; an old
/// schema fails here and nothing gets touched.
pub async fn ensure_import_columns(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("select active, source from places limit 1")
        .fetch_optional(pool)
        .await?;
    Ok(())
}

/// Rows that predate provenance tracking are hand-entered data.
pub async fn tag_missing_source_as_manual(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("update places set source = 'manual' where source is null")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn deactivate_active(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("update places set active = false where active = true")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn reactivate_manual(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("update places set active = true where source = 'manual'")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn deactivate_non_manual(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("update places set active = false where source is distinct from 'manual'")
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

pub async fn upsert_batch(rows: &[PlaceRow], pool: &PgPool) -> Result<(), sqlx::Error> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "insert into places \
         (name, description, description_ar, category, village, lat, lng, \
          image_url, open_hours, featured, google_place_id, active, source) ",
    );
    builder.push_values(rows, |mut b, row| {
        b.push_bind(&row.name)
            .push_bind(&row.description)
            .push_bind(&row.description_ar)
            .push_bind(row.category.as_str())
            .push_bind(&row.village)
            .push_bind(row.lat)
            .push_bind(row.lng)
            .push_bind(&row.image_url)
            .push_bind(row.open_hours.as_ref().map(|h| serde_json::json!(h)))
            .push_bind(row.featured)
            .push_bind(&row.google_place_id)
            .push_bind(row.active)
            .push_bind(row.source.as_str());
    });
    builder.push(
        " on conflict (google_place_id) do update set \
         name = excluded.name, \
         description = excluded.description, \
         description_ar = excluded.description_ar, \
         category = excluded.category, \
         village = excluded.village, \
         lat = excluded.lat, \
         lng = excluded.lng, \
         image_url = excluded.image_url, \
         open_hours = excluded.open_hours, \
         featured = excluded.featured, \
         active = excluded.active, \
         source = excluded.source",
    );

    builder.build().execute(pool).await?;
    Ok(())
}
