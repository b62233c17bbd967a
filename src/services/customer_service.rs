//! Customer registry.

use uuid::Uuid;

use super::Context;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::customer::{
    CreateCustomerRequest, Customer, CustomerFilter, UpdateCustomerRequest,
};
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "sales";

pub async fn create_customer(
    ctx: &Context,
    auth: &AuthContext,
    request: CreateCustomerRequest,
) -> Result<Customer, AppError> {
    let customer = Customer::new(auth.tenant_id, request)?;
    if let Some(document) = &customer.document {
        let taken = ctx
            .repos
            .customers
            .find_customer_by_document(auth.tenant_id, document)
            .await?;
        if taken.is_some() {
            return Err(AppError::Conflict(format!(
                "A customer with document {document} already exists"
            )));
        }
    }
    ctx.repos.customers.create_customer(&customer).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "customer",
            customer.id,
            format!("Customer {} created", customer.name),
        )
        .with_new(&customer),
    )
    .await;
    Ok(customer)
}

pub async fn get_customer(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Customer, AppError> {
    ctx.repos
        .customers
        .find_customer(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Customer"))
}

pub async fn list_customers(
    ctx: &Context,
    auth: &AuthContext,
    filter: &CustomerFilter,
    page: PageRequest,
) -> Result<Page<Customer>, AppError> {
    ctx.repos
        .customers
        .list_customers(auth.tenant_id, filter, page)
        .await
}

pub async fn update_customer(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: UpdateCustomerRequest,
) -> Result<Customer, AppError> {
    let mut customer = get_customer(ctx, auth, id).await?;
    let before = customer.clone();
    customer.apply_update(request)?;
    ctx.repos.customers.update_customer(&customer).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Update,
            MODULE,
            "customer",
            id,
            format!("Customer {} updated", customer.name),
        )
        .with_old(&before)
        .with_new(&customer),
    )
    .await;
    Ok(customer)
}

pub async fn delete_customer(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
    let customer = get_customer(ctx, auth, id).await?;
    ctx.repos.customers.delete_customer(auth.tenant_id, id).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Delete,
            MODULE,
            "customer",
            id,
            format!("Customer {} deleted", customer.name),
        )
        .with_old(&customer),
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::customer::CustomerType;
    use crate::services::testing;

    fn business(name: &str, document: &str) -> CreateCustomerRequest {
        CreateCustomerRequest {
            name: name.into(),
            document: Some(document.into()),
            email: Some("buyer@example.com".into()),
            phone: None,
            customer_type: Some(CustomerType::Business),
        }
    }

    #[tokio::test]
    async fn documents_collide_after_normalisation() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let first = create_customer(&ctx, &auth, business("Acme", "12.345.678/0001-90"))
            .await
            .unwrap();
        assert_eq!(first.document.as_deref(), Some("12345678000190"));

        let clash = create_customer(&ctx, &auth, business("Acme Two", "12345678000190")).await;
        assert!(matches!(clash, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn customers_without_document_never_clash() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        for _ in 0..2 {
            let mut request = business("Walk-in", "x");
            request.document = None;
            create_customer(&ctx, &auth, request).await.unwrap();
        }
        let all = list_customers(&ctx, &auth, &CustomerFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);
    }

    #[tokio::test]
    async fn update_then_soft_delete() {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let customer = create_customer(&ctx, &auth, business("Acme", "111"))
            .await
            .unwrap();

        let updated = update_customer(
            &ctx,
            &auth,
            customer.id,
            UpdateCustomerRequest {
                name: None,
                email: Some("not-an-email".into()),
                phone: None,
                customer_type: None,
                is_active: None,
            },
        )
        .await;
        assert!(matches!(updated, Err(AppError::BadRequest(_))));

        delete_customer(&ctx, &auth, customer.id).await.unwrap();
        assert!(matches!(
            get_customer(&ctx, &auth, customer.id).await,
            Err(AppError::NotFound("Customer"))
        ));
    }
}
