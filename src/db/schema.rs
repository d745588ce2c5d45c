// src/db/schema.rs

// Colunas de cada tabela, na versão atual e na versão antiga do banco.
// As colunas legadas são o que bancos criados antes de soft delete, calibração e
// encerramento de vínculos ainda têm; a coluna de organização se chamava `org_id`.

#[derive(Debug, PartialEq, Eq)]
pub struct EntitySchema {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub legacy_columns: &'static [&'static str],
    pub tenant_column: &'static str,
    pub legacy_tenant_column: &'static str,
    pub recency_column: &'static str,
}

pub const EQUIPMENT: EntitySchema = EntitySchema {
    table: "equipamentos",
    columns: &[
        "id", "codigo", "nome", "modelo", "tipo", "status",
        "ultima_calibracao", "proxima_calibracao",
        "deleted_at", "created_at", "updated_at", "organization_id",
    ],
    legacy_columns: &[
        "id", "codigo", "nome", "modelo", "tipo", "status", "created_at", "updated_at", "org_id",
    ],
    tenant_column: "organization_id",
    legacy_tenant_column: "org_id",
    recency_column: "created_at",
};

pub const SITE: EntitySchema = EntitySchema {
    table: "obras",
    columns: &[
        "id", "codigo", "nome", "local", "cidade", "uf", "status",
        "deleted_at", "created_at", "updated_at", "organization_id",
    ],
    legacy_columns: &["id", "codigo", "nome", "local", "status", "created_at", "updated_at", "org_id"],
    tenant_column: "organization_id",
    legacy_tenant_column: "org_id",
    recency_column: "created_at",
};

pub const ASSIGNMENT: EntitySchema = EntitySchema {
    table: "vinculos",
    columns: &[
        "id", "equipamento_id", "obra_id", "user_id", "inicio_em", "encerrou_em", "status",
        "motivo_encerramento", "encerrado_por", "termo_url", "termo_nome",
        "deleted_at", "created_at", "updated_at", "organization_id",
    ],
    legacy_columns: &[
        "id", "equipamento_id", "obra_id", "user_id", "inicio_em", "encerrou_em", "status",
        "termo_url", "termo_nome", "created_at", "updated_at", "org_id",
    ],
    tenant_column: "organization_id",
    legacy_tenant_column: "org_id",
    recency_column: "created_at",
};

pub const MEASUREMENT: EntitySchema = EntitySchema {
    table: "medicoes",
    columns: &[
        "id", "equipamento_id", "obra_id", "user_id", "vinculo_id", "tipo", "valor", "unidade",
        "conforme", "data", "medido_em", "observacoes",
        "deleted_at", "created_at", "updated_at", "organization_id",
    ],
    legacy_columns: &[
        "id", "equipamento_id", "obra_id", "user_id", "tipo", "valor", "unidade",
        "conforme", "data", "medido_em", "observacoes", "created_at", "updated_at", "org_id",
    ],
    tenant_column: "organization_id",
    legacy_tenant_column: "org_id",
    recency_column: "medido_em",
};

pub const PROFILE: EntitySchema = EntitySchema {
    table: "profiles",
    columns: &["id", "email", "nome", "role", "organization_id", "created_at", "updated_at"],
    legacy_columns: &["id", "email", "nome", "role", "org_id", "created_at", "updated_at"],
    tenant_column: "organization_id",
    legacy_tenant_column: "org_id",
    recency_column: "created_at",
};

pub const AUDIT_LOG: EntitySchema = EntitySchema {
    table: "audit_log",
    columns: &["id", "user_id", "organization_id", "action", "payload", "created_at"],
    legacy_columns: &["id", "user_id", "action", "payload", "created_at"],
    tenant_column: "organization_id",
    legacy_tenant_column: "org_id",
    recency_column: "created_at",
};

pub const ORGANIZATIONS_TABLE: &str = "organizations";
