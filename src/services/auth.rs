// src/services/auth.rs

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{
    common::error::AppError,
    models::auth::{Claims, Identity},
};

/// Valida os tokens emitidos pelo serviço de auth hospedado. Login, cadastro e troca de
/// senha ficam com ele; aqui só transformamos o bearer numa `Identity`.
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    audience: String,
}

impl AuthService {
    pub fn new(jwt_secret: String, audience: String) -> Self {
        Self { jwt_secret, audience }
    }

    pub fn validate_token(&self, token: &str) -> Result<Identity, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.as_str()]);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("token recusado: {}", e);
            AppError::Unauthenticated
        })?;

        Ok(Identity {
            id: token_data.claims.sub,
            email: token_data.claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn token(secret: &str, aud: &str, sub: Uuid) -> String {
        let claims = Claims {
            sub,
            exp: (Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
            email: Some("tecnico@medlux.com.br".into()),
            aud: Some(aud.into()),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref())).unwrap()
    }

    #[test]
    fn accepts_hosted_auth_tokens() {
        let service = AuthService::new("segredo-de-teste".into(), "authenticated".into());
        let sub = Uuid::new_v4();

        let identity = service.validate_token(&token("segredo-de-teste", "authenticated", sub)).unwrap();
        assert_eq!(identity.id, sub);
        assert_eq!(identity.email.as_deref(), Some("tecnico@medlux.com.br"));
    }

    #[test]
    fn rejects_wrong_secret_or_audience() {
        let service = AuthService::new("segredo-de-teste".into(), "authenticated".into());
        let sub = Uuid::new_v4();

        assert!(matches!(
            service.validate_token(&token("outro", "authenticated", sub)),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            service.validate_token(&token("segredo-de-teste", "anon", sub)),
            Err(AppError::Unauthenticated)
        ));
    }
}
