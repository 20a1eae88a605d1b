use uuid::Uuid;

use super::ServiceContext;
use crate::domain::reports::{CreateReportRequest, Report, ReportStatus};
use crate::error::{ApiError, ApiResult};

pub async fn create_report(ctx: &ServiceContext, req: CreateReportRequest) -> ApiResult<Report> {
    if req.title.trim().is_empty() {
        return Err(ApiError::bad_request("Report title is required"));
    }

    ctx.user(req.reporter_id).await?;
    if let Some(tool_id) = req.tool_id {
        ctx.tool(tool_id).await?;
    }
    if let Some(booking_id) = req.booking_id {
        ctx.booking(booking_id).await?;
    }

    let now = ctx.clock.now();
    let report = Report {
        id: Uuid::new_v4(),
        reporter_id: req.reporter_id,
        tool_id: req.tool_id,
        booking_id: req.booking_id,
        title: req.title.trim().to_string(),
        description: req.description,
        status: ReportStatus::Open,
        created_at: now,
        updated_at: now,
    };
    ctx.store.insert_report(&report).await?;

    tracing::info!(report_id = %report.id, reporter_id = %report.reporter_id, "Report filed");
    Ok(report)
}

pub async fn list_reports(
    ctx: &ServiceContext,
    status: Option<ReportStatus>,
) -> ApiResult<Vec<Report>> {
    ctx.store.list_reports(status).await
}

pub async fn update_report_status(
    ctx: &ServiceContext,
    report_id: Uuid,
    status: ReportStatus,
) -> ApiResult<Report> {
    ctx.store
        .update_report_status(report_id, status, ctx.clock.now())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Report {} not found", report_id)))
}

pub async fn delete_report(ctx: &ServiceContext, report_id: Uuid) -> ApiResult<()> {
    if !ctx.store.delete_report(report_id).await? {
        return Err(ApiError::not_found(format!("Report {} not found", report_id)));
    }
    tracing::info!(report_id = %report_id, "Report deleted");
    Ok(())
}
