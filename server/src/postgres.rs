pub async fn prepare_database(
    transaction: &mut ::sqlx::Transaction<'_, ::sqlx::Postgres>,
) -> ::sqlx::Result<()> {
    ::sqlx::query(
        "
        CREATE TABLE IF NOT EXISTS entities (
            id           TEXT  PRIMARY KEY,
            kind         TEXT  NOT NULL,
            community_id TEXT  NOT NULL,
            updated_on   INT8  NOT NULL,
            document     JSONB NOT NULL
        );
    ",
    )
    .execute(&mut **transaction)
    .await?;

    ::sqlx::query(
        "
        CREATE INDEX IF NOT EXISTS entities_community_index
        ON entities (community_id, kind);
    ",
    )
    .execute(&mut **transaction)
    .await?;

    ::sqlx::query(
        "
        CREATE TABLE IF NOT EXISTS ledger (
            actor      TEXT NOT NULL,
            subject    TEXT NOT NULL,
            kind       TEXT NOT NULL,
            vote       INT2,
            active     BOOL NOT NULL,
            created_on INT8 NOT NULL,
            updated_on INT8 NOT NULL,
            PRIMARY KEY (actor, subject, kind)
        );
    ",
    )
    .execute(&mut **transaction)
    .await?;

    ::sqlx::query(
        "
        CREATE INDEX IF NOT EXISTS ledger_subject_index
        ON ledger (subject, kind);
    ",
    )
    .execute(&mut **transaction)
    .await?;

    ::sqlx::query(
        "
        CREATE TABLE IF NOT EXISTS users (
            id           TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            avatar_url   TEXT
        );
    ",
    )
    .execute(&mut **transaction)
    .await?;

    Ok(())
}
