//! Publishing several pages at once from the page list.

use std::collections::HashSet;

use lexcms_client::{BulkPublishOutcome, PagesApi};
use lexcms_core::error::CoreError;
use lexcms_core::page::validate_slug;
use lexcms_core::permissions::{capabilities, require_any, PermissionOracle};

use crate::error::EditorError;
use crate::notice::{Notice, NoticeBus};

/// Publish `slugs` in one request.
///
/// Requires `pages:bulk-publish`. Slugs are checked and de-duplicated
/// locally; pages the server could not publish are listed in the outcome
/// rather than failing the whole call.
pub async fn bulk_publish(
    api: &dyn PagesApi,
    permissions: &dyn PermissionOracle,
    notices: &NoticeBus,
    slugs: &[String],
) -> Result<BulkPublishOutcome, EditorError> {
    let slugs = match prepare(permissions, slugs) {
        Ok(slugs) => slugs,
        Err(e) => {
            let notice = if e.is_read_only() {
                Notice::warning(e.user_message("Read-only"))
            } else {
                Notice::error(e.user_message("Nothing to publish"))
            };
            notices.publish(notice);
            return Err(e);
        }
    };

    let outcome = match api.bulk_publish(&slugs).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let err = EditorError::from(e);
            tracing::error!(count = slugs.len(), error = %err, "Bulk publish failed");
            notices.publish(Notice::error(err.user_message("Failed to publish pages")));
            return Err(err);
        }
    };

    for failure in &outcome.failed {
        tracing::warn!(slug = %failure.slug, error = %failure.error, "Page not published");
    }
    tracing::info!(
        published = outcome.published.len(),
        failed = outcome.failed.len(),
        "Bulk publish finished"
    );

    let notice = if outcome.failed.is_empty() {
        Notice::success(format!("Published {} page(s)", outcome.published.len()))
    } else {
        Notice::warning(format!(
            "Published {} of {} page(s); {} failed",
            outcome.published.len(),
            slugs.len(),
            outcome.failed.len()
        ))
    };
    notices.publish(notice);
    Ok(outcome)
}

fn prepare(permissions: &dyn PermissionOracle, slugs: &[String]) -> Result<Vec<String>, EditorError> {
    require_any(permissions, &[capabilities::PAGES_BULK_PUBLISH], "bulk publishing")?;

    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let slug = slug.trim();
        validate_slug(slug)?;
        if seen.insert(slug.to_string()) {
            unique.push(slug.to_string());
        }
    }
    if unique.is_empty() {
        return Err(CoreError::Validation("Select at least one page to publish".into()).into());
    }
    Ok(unique)
}
