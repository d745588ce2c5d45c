use sqlx::PgConnection;
use uuid::Uuid;

use crate::db::query::BackendError;

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
/// Fixa a organização na conexão para a transação corrente; as políticas RLS leem
/// `app.current_org`.
pub(crate) async fn set_rls_org(conn: &mut PgConnection, org_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT set_config('app.current_org', $1, true)")
        .bind(org_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Nomes de tabela/coluna entram no SQL como identificadores entre aspas;
/// só aceitamos `[a-z0-9_]`.
pub(crate) fn quote_ident(name: &str) -> Result<String, BackendError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(BackendError::new(
            Some("42602"),
            Some(400),
            format!("identificador inválido: {name:?}"),
        ));
    }
    Ok(format!("\"{name}\""))
}

/// Converte o erro do sqlx no erro "cru" do backend, preservando o SQLSTATE.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> BackendError {
    match &err {
        sqlx::Error::Database(db_err) => {
            BackendError::new(db_err.code().as_deref(), None, db_err.message())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => BackendError::network(err.to_string()),
        sqlx::Error::RowNotFound => BackendError::new(None, Some(404), err.to_string()),
        _ => BackendError::new(None, Some(500), err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_rejects_injection() {
        assert_eq!(quote_ident("equipamentos").unwrap(), "\"equipamentos\"");
        assert!(quote_ident("nome\"; drop table x; --").is_err());
        assert!(quote_ident("").is_err());
    }

    #[test]
    fn pool_timeout_is_a_network_error() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code.as_deref(), Some(crate::db::query::CONNECTION_EXCEPTION));
    }
}
