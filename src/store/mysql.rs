use async_trait::async_trait;
use chrono::NaiveDate;
use futures::TryStreamExt;
use sqlx::{MySql, MySqlPool, QueryBuilder, Transaction};

use super::{DateFilter, PlanFn, TransitionOutcome, TransitionPlan, WfhStore, not_found_message};
use crate::error::LifecycleError;
use crate::model::request::{ReasonChange, RequestEnvelope};
use crate::model::request_date::{RequestDate, RequestDateRow, RequestStatus, Shift};
use crate::model::status_log::{NewLogEntry, StatusLogEntry};

const DATE_COLUMNS: &str = "d.request_date_id, d.request_id, d.request_date, d.request_shift, \
     d.request_status, d.rescind_reason, d.withdraw_reason";

const ENVELOPE_COLUMNS: &str =
    "request_id, staff_id, creation_date, apply_reason, reject_reason";

const LOG_COLUMNS: &str = "log_id, request_id, log_date, action, reason";

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn into_dates(rows: Vec<RequestDateRow>) -> Result<Vec<RequestDate>, LifecycleError> {
    rows.into_iter().map(RequestDate::try_from).collect()
}

/// `SELECT` over `request_dates d` narrowed by `filter`.
fn filtered_dates_query(filter: &DateFilter) -> QueryBuilder<'_, MySql> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {} FROM request_dates d WHERE d.request_id = ",
        DATE_COLUMNS
    ));
    qb.push_bind(filter.request_id);

    if let Some(dates) = &filter.dates {
        qb.push(" AND d.request_date IN (");
        let mut separated = qb.separated(", ");
        for date in dates {
            separated.push_bind(*date);
        }
        separated.push_unseparated(")");
    }

    if let Some(shift) = filter.shift {
        qb.push(" AND d.request_shift = ");
        qb.push_bind(shift.to_string());
    }

    qb.push(" ORDER BY d.request_date, d.request_date_id");
    qb
}

async fn apply_plan(
    tx: &mut Transaction<'_, MySql>,
    plan: &TransitionPlan,
) -> Result<StatusLogEntry, LifecycleError> {
    for update in &plan.updates {
        sqlx::query(
            r#"
            UPDATE request_dates
            SET request_status = ?, rescind_reason = ?, withdraw_reason = ?
            WHERE request_date_id = ?
            "#,
        )
        .bind(update.status.to_string())
        .bind(update.rescind_reason.as_deref())
        .bind(update.withdraw_reason.as_deref())
        .bind(update.request_date_id)
        .execute(&mut **tx)
        .await?;
    }

    if let Some(reason) = &plan.reject_reason {
        sqlx::query("UPDATE request SET reject_reason = ? WHERE request_id = ?")
            .bind(reason.as_deref())
            .bind(plan.log.request_id)
            .execute(&mut **tx)
            .await?;
    }

    insert_log(tx, &plan.log).await
}

async fn insert_log(
    tx: &mut Transaction<'_, MySql>,
    entry: &NewLogEntry,
) -> Result<StatusLogEntry, LifecycleError> {
    let result = sqlx::query(
        "INSERT INTO status_log (request_id, log_date, action, reason) VALUES (?, NOW(6), ?, ?)",
    )
    .bind(entry.request_id)
    .bind(&entry.action)
    .bind(entry.reason.as_deref())
    .execute(&mut **tx)
    .await?;

    let sql = format!("SELECT {} FROM status_log WHERE log_id = ?", LOG_COLUMNS);
    let logged = sqlx::query_as::<_, StatusLogEntry>(&sql)
        .bind(result.last_insert_id())
        .fetch_one(&mut **tx)
        .await?;
    Ok(logged)
}

#[async_trait]
impl WfhStore for MySqlStore {
    async fn insert_envelope(
        &self,
        staff_id: u64,
        creation_date: NaiveDate,
        apply_reason: &str,
    ) -> Result<RequestEnvelope, LifecycleError> {
        let result = sqlx::query(
            r#"
            INSERT INTO request (staff_id, creation_date, apply_reason)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(staff_id)
        .bind(creation_date)
        .bind(apply_reason)
        .execute(&self.pool)
        .await?;

        Ok(RequestEnvelope {
            request_id: result.last_insert_id(),
            staff_id,
            creation_date,
            apply_reason: apply_reason.to_string(),
            reject_reason: None,
        })
    }

    async fn delete_envelope(&self, request_id: u64) -> Result<(), LifecycleError> {
        sqlx::query("DELETE FROM request WHERE request_id = ?")
            .bind(request_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_envelope(
        &self,
        request_id: u64,
    ) -> Result<Option<RequestEnvelope>, LifecycleError> {
        let sql = format!("SELECT {} FROM request WHERE request_id = ?", ENVELOPE_COLUMNS);
        let envelope = sqlx::query_as::<_, RequestEnvelope>(&sql)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(envelope)
    }

    async fn envelopes_by_staff(&self, staff_id: u64) -> Result<Vec<RequestEnvelope>, LifecycleError> {
        let sql = format!(
            "SELECT {} FROM request WHERE staff_id = ? ORDER BY request_id",
            ENVELOPE_COLUMNS
        );
        let envelopes = sqlx::query_as::<_, RequestEnvelope>(&sql)
            .bind(staff_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(envelopes)
    }

    async fn replace_reject_reason(
        &self,
        request_id: u64,
        reason: Option<&str>,
    ) -> Result<Option<ReasonChange>, LifecycleError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, Option<String>>(
            "SELECT reject_reason FROM request WHERE request_id = ? FOR UPDATE",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(previous) = previous else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE request SET reject_reason = ? WHERE request_id = ?")
            .bind(reason)
            .bind(request_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(ReasonChange {
            request_id,
            previous_reject_reason: previous,
            reject_reason: reason.map(str::to_string),
        }))
    }

    async fn insert_dates(
        &self,
        request_id: u64,
        dates: &[(NaiveDate, Shift)],
        status: RequestStatus,
    ) -> Result<Vec<RequestDate>, LifecycleError> {
        let mut tx = self.pool.begin().await?;

        let mut qb = QueryBuilder::<MySql>::new(
            "INSERT INTO request_dates (request_id, request_date, request_shift, request_status) ",
        );
        qb.push_values(dates, |mut row, (date, shift)| {
            row.push_bind(request_id)
                .push_bind(*date)
                .push_bind(shift.to_string())
                .push_bind(status.to_string());
        });
        qb.build().execute(&mut *tx).await?;

        let filter = DateFilter::all(request_id);
        let rows = filtered_dates_query(&filter)
            .build_query_as::<RequestDateRow>()
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        into_dates(rows)
    }

    async fn dates_by_request_id(&self, request_id: u64) -> Result<Vec<RequestDate>, LifecycleError> {
        let filter = DateFilter::all(request_id);
        let rows = filtered_dates_query(&filter)
            .build_query_as::<RequestDateRow>()
            .fetch_all(&self.pool)
            .await?;
        into_dates(rows)
    }

    async fn dates_by_request_ids(
        &self,
        request_ids: &[u64],
    ) -> Result<Vec<RequestDate>, LifecycleError> {
        if request_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM request_dates d WHERE d.request_id IN (",
            DATE_COLUMNS
        ));
        let mut separated = qb.separated(", ");
        for id in request_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY d.request_id, d.request_date");

        let mut rows = qb.build_query_as::<RequestDateRow>().fetch(&self.pool);
        let mut dates = Vec::new();
        while let Some(row) = rows.try_next().await? {
            dates.push(RequestDate::try_from(row)?);
        }
        Ok(dates)
    }

    async fn dates_by_status(
        &self,
        request_id: u64,
        statuses: &[RequestStatus],
    ) -> Result<Vec<RequestDate>, LifecycleError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM request_dates d WHERE d.request_id = ",
            DATE_COLUMNS
        ));
        qb.push_bind(request_id);
        qb.push(" AND d.request_status IN (");
        let mut separated = qb.separated(", ");
        for status in statuses {
            separated.push_bind(status.to_string());
        }
        separated.push_unseparated(") ORDER BY d.request_date");

        let rows = qb
            .build_query_as::<RequestDateRow>()
            .fetch_all(&self.pool)
            .await?;
        into_dates(rows)
    }

    async fn active_dates_for_staff(
        &self,
        staff_id: u64,
        dates: &[NaiveDate],
    ) -> Result<Vec<RequestDate>, LifecycleError> {
        if dates.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM request_dates d JOIN request r ON r.request_id = d.request_id \
             WHERE r.staff_id = ",
            DATE_COLUMNS
        ));
        qb.push_bind(staff_id);
        qb.push(" AND d.request_date IN (");
        let mut separated = qb.separated(", ");
        for date in dates {
            separated.push_bind(*date);
        }
        separated.push_unseparated(")");
        qb.push(" AND d.request_status NOT IN (");
        let mut separated = qb.separated(", ");
        for status in [
            RequestStatus::Withdrawn,
            RequestStatus::Rescinded,
            RequestStatus::Rejected,
        ] {
            separated.push_bind(status.to_string());
        }
        separated.push_unseparated(")");

        let rows = qb
            .build_query_as::<RequestDateRow>()
            .fetch_all(&self.pool)
            .await?;
        into_dates(rows)
    }

    async fn stale_request_ids(&self, cutoff: NaiveDate) -> Result<Vec<u64>, LifecycleError> {
        let ids = sqlx::query_scalar::<_, u64>(
            r#"
            SELECT DISTINCT request_id
            FROM request_dates
            WHERE request_status = ?
            AND request_date < ?
            ORDER BY request_id
            "#,
        )
        .bind(RequestStatus::PendingApproval.to_string())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn transition(
        &self,
        filter: &DateFilter,
        plan: &PlanFn<'_>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let mut tx = self.pool.begin().await?;

        let mut locking = filtered_dates_query(filter);
        locking.push(" FOR UPDATE");
        let rows = locking
            .build_query_as::<RequestDateRow>()
            .fetch_all(&mut *tx)
            .await?;
        let current = into_dates(rows)?;

        if current.is_empty() {
            tx.rollback().await?;
            return Err(LifecycleError::NotFound(not_found_message(filter)));
        }

        let planned = match plan(&current) {
            Ok(Some(planned)) => planned,
            Ok(None) => {
                tx.rollback().await?;
                return Ok(TransitionOutcome {
                    dates: current,
                    log: None,
                });
            }
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        let log = apply_plan(&mut tx, &planned).await?;

        let rows = filtered_dates_query(filter)
            .build_query_as::<RequestDateRow>()
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(TransitionOutcome {
            dates: into_dates(rows)?,
            log: Some(log),
        })
    }

    async fn append_log(&self, entry: NewLogEntry) -> Result<StatusLogEntry, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let logged = insert_log(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok(logged)
    }

    async fn logs_for_request(&self, request_id: u64) -> Result<Vec<StatusLogEntry>, LifecycleError> {
        let sql = format!(
            "SELECT {} FROM status_log WHERE request_id = ? ORDER BY log_date, log_id",
            LOG_COLUMNS
        );
        let logs = sqlx::query_as::<_, StatusLogEntry>(&sql)
            .bind(request_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }
}
