//! Absence requests and their review.

use chrono::Utc;
use uuid::Uuid;

use super::Context;
use super::employee_service::get_employee;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::absence::{
    Absence, AbsenceFilter, AbsenceStatus, RejectAbsenceRequest, RequestAbsenceRequest,
    inclusive_days,
};
use crate::models::audit::{AuditAction, AuditEntry};
use crate::models::notification::{
    CreateNotificationRequest, NotificationPriority, NotificationType,
};
use crate::models::webhook::events;
use crate::pagination::{Page, PageRequest};

const MODULE: &str = "hr.absences";

pub async fn request_absence(
    ctx: &Context,
    auth: &AuthContext,
    request: RequestAbsenceRequest,
) -> Result<Absence, AppError> {
    if request.end_date < request.start_date {
        return Err(AppError::bad_request("End date cannot be before the start date"));
    }
    let employee = get_employee(ctx, auth, request.employee_id).await?;
    if !employee.is_employed() {
        return Err(AppError::bad_request("Employee is terminated"));
    }
    let has_document = request
        .document_url
        .as_deref()
        .is_some_and(|url| !url.trim().is_empty());
    if request.absence_type.requires_document() && !has_document {
        return Err(AppError::BadRequest(format!(
            "{} requires a supporting document",
            request.absence_type
        )));
    }

    let now = Utc::now();
    let absence = Absence {
        id: Uuid::new_v4(),
        tenant_id: auth.tenant_id,
        employee_id: employee.id,
        absence_type: request.absence_type,
        start_date: request.start_date,
        end_date: request.end_date,
        total_days: inclusive_days(request.start_date, request.end_date),
        reason: request.reason,
        document_url: request.document_url,
        status: AbsenceStatus::Pending,
        requested_by: auth.user_id,
        reviewed_by: None,
        reviewed_at: None,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    };
    ctx.repos.absences.insert_absence(&absence).await?;

    ctx.audit(
        auth,
        AuditEntry::new(
            AuditAction::Create,
            MODULE,
            "absence",
            absence.id,
            format!(
                "{} requested for {} day(s) from {}",
                absence.absence_type, absence.total_days, absence.start_date
            ),
        )
        .with_new(&absence),
    )
    .await;
    Ok(absence)
}

pub async fn get_absence(ctx: &Context, auth: &AuthContext, id: Uuid) -> Result<Absence, AppError> {
    ctx.repos
        .absences
        .find_absence(auth.tenant_id, id)
        .await?
        .ok_or(AppError::NotFound("Absence"))
}

pub async fn list_absences(
    ctx: &Context,
    auth: &AuthContext,
    filter: &AbsenceFilter,
    page: PageRequest,
) -> Result<Page<Absence>, AppError> {
    ctx.repos
        .absences
        .list_absences(auth.tenant_id, filter, page)
        .await
}

pub async fn approve_absence(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Absence, AppError> {
    let mut absence = get_absence(ctx, auth, id).await?;
    absence.approve(auth.user_id)?;
    ctx.repos.absences.update_absence(&absence).await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Approve, MODULE, "absence", id, "Absence approved")
            .with_new(&absence),
    )
    .await;
    notify_requester(
        ctx,
        &absence,
        "Absence approved",
        format!(
            "Your {} from {} to {} was approved",
            absence.absence_type, absence.start_date, absence.end_date
        ),
        NotificationType::Success,
    )
    .await;
    ctx.emit(auth.tenant_id, events::ABSENCE_APPROVED, &absence);
    Ok(absence)
}

pub async fn reject_absence(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
    request: RejectAbsenceRequest,
) -> Result<Absence, AppError> {
    let mut absence = get_absence(ctx, auth, id).await?;
    absence.reject(auth.user_id, request.reason)?;
    ctx.repos.absences.update_absence(&absence).await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Reject, MODULE, "absence", id, "Absence rejected")
            .with_new(&absence),
    )
    .await;
    notify_requester(
        ctx,
        &absence,
        "Absence rejected",
        format!(
            "Your {} from {} was rejected: {}",
            absence.absence_type,
            absence.start_date,
            absence.rejection_reason.as_deref().unwrap_or_default()
        ),
        NotificationType::Warning,
    )
    .await;
    ctx.emit(auth.tenant_id, events::ABSENCE_REJECTED, &absence);
    Ok(absence)
}

pub async fn cancel_absence(
    ctx: &Context,
    auth: &AuthContext,
    id: Uuid,
) -> Result<Absence, AppError> {
    let mut absence = get_absence(ctx, auth, id).await?;
    absence.cancel()?;
    ctx.repos.absences.update_absence(&absence).await?;

    ctx.audit(
        auth,
        AuditEntry::new(AuditAction::Cancel, MODULE, "absence", id, "Absence cancelled")
            .with_new(&absence),
    )
    .await;
    Ok(absence)
}

async fn notify_requester(
    ctx: &Context,
    absence: &Absence,
    title: &str,
    message: String,
    notification_type: NotificationType,
) {
    ctx.notify(
        absence.tenant_id,
        CreateNotificationRequest {
            user_id: absence.requested_by,
            title: title.to_string(),
            message,
            notification_type: Some(notification_type),
            priority: Some(NotificationPriority::Normal),
            entity_type: Some("absence".to_string()),
            entity_id: Some(absence.id),
            action_url: Some(format!("/v1/absences/{}", absence.id)),
        },
    )
    .await;
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::absence::AbsenceType;
    use crate::services::employee_service::{create_employee, tests::hire};
    use crate::services::{notification_service, testing};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn leave(employee_id: Uuid, start: NaiveDate, end: NaiveDate) -> RequestAbsenceRequest {
        RequestAbsenceRequest {
            employee_id,
            absence_type: AbsenceType::PersonalLeave,
            start_date: start,
            end_date: end,
            reason: None,
            document_url: None,
        }
    }

    async fn setup() -> (Context, AuthContext, Uuid) {
        let ctx = testing::context();
        let auth = testing::admin(&ctx).await;
        let employee = create_employee(&ctx, &auth, hire("E-1", date(2023, 1, 1), 300_000))
            .await
            .unwrap();
        (ctx, auth, employee.id)
    }

    #[tokio::test]
    async fn counts_days_inclusively() {
        let (ctx, auth, employee) = setup().await;
        let absence = request_absence(&ctx, &auth, leave(employee, date(2025, 3, 3), date(2025, 3, 7)))
            .await
            .unwrap();
        assert_eq!(absence.total_days, 5);
        assert_eq!(absence.status, AbsenceStatus::Pending);
        assert_eq!(absence.requested_by, auth.user_id);
    }

    #[tokio::test]
    async fn overlapping_requests_are_rejected() {
        let (ctx, auth, employee) = setup().await;
        request_absence(&ctx, &auth, leave(employee, date(2025, 3, 3), date(2025, 3, 7)))
            .await
            .unwrap();
        let clash =
            request_absence(&ctx, &auth, leave(employee, date(2025, 3, 7), date(2025, 3, 10))).await;
        assert!(matches!(clash, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn cancelled_absences_free_the_calendar() {
        let (ctx, auth, employee) = setup().await;
        let first = request_absence(&ctx, &auth, leave(employee, date(2025, 3, 3), date(2025, 3, 7)))
            .await
            .unwrap();
        cancel_absence(&ctx, &auth, first.id).await.unwrap();

        assert!(
            request_absence(&ctx, &auth, leave(employee, date(2025, 3, 5), date(2025, 3, 6)))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn sick_leave_needs_a_document() {
        let (ctx, auth, employee) = setup().await;
        let mut request = leave(employee, date(2025, 3, 3), date(2025, 3, 4));
        request.absence_type = AbsenceType::SickLeave;
        assert!(matches!(
            request_absence(&ctx, &auth, request).await,
            Err(AppError::BadRequest(_))
        ));

        let mut request = leave(employee, date(2025, 3, 3), date(2025, 3, 4));
        request.absence_type = AbsenceType::SickLeave;
        request.document_url = Some("/files/t/absences/cert.pdf".into());
        assert!(request_absence(&ctx, &auth, request).await.is_ok());
    }

    #[tokio::test]
    async fn end_before_start_is_invalid() {
        let (ctx, auth, employee) = setup().await;
        let result =
            request_absence(&ctx, &auth, leave(employee, date(2025, 3, 7), date(2025, 3, 3))).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn review_notifies_the_requester() {
        let (ctx, auth, employee) = setup().await;
        let absence = request_absence(&ctx, &auth, leave(employee, date(2025, 3, 3), date(2025, 3, 4)))
            .await
            .unwrap();

        let approved = approve_absence(&ctx, &auth, absence.id).await.unwrap();
        assert_eq!(approved.status, AbsenceStatus::Approved);
        assert_eq!(approved.reviewed_by, Some(auth.user_id));

        let unread = notification_service::unread_count(&ctx, &auth).await.unwrap();
        assert_eq!(unread.unread, 1);

        let again = reject_absence(
            &ctx,
            &auth,
            absence.id,
            RejectAbsenceRequest {
                reason: "late".into(),
            },
        )
        .await;
        assert!(matches!(again, Err(AppError::BadRequest(_))));
    }
}
