use axum::{
    extract::{Path, Query},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::ApiResponse,
    services::leaderboard::{leaderboard, LeaderboardRows, LeaderboardView, TimeFilter},
};

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub filter: TimeFilter,
    pub filters: Vec<TimeFilter>,
    #[serde(flatten)]
    pub board: LeaderboardRows,
}

/// GET /api/v1/leaderboard/{view}?filter=
pub async fn get_leaderboard(
    Path(view): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<ApiResponse<LeaderboardResponse>>> {
    let view = LeaderboardView::parse(&view)?;
    let filter = TimeFilter::parse(query.filter.as_deref())?;

    Ok(Json(ApiResponse::success(LeaderboardResponse {
        filter,
        filters: TimeFilter::ALL.to_vec(),
        board: leaderboard(view, filter),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[tokio::test]
    async fn serves_rotated_fixture() {
        let Json(response) = get_leaderboard(
            Path("activity".to_string()),
            Query(LeaderboardQuery {
                filter: Some("Cycle".to_string()),
            }),
        )
        .await
        .expect("leaderboard");
        assert_eq!(response.data.filter, TimeFilter::Cycle);
        let LeaderboardRows::Activity(rows) = response.data.board else {
            panic!("expected activity rows");
        };
        assert_eq!(rows[0].wallet_address, "0x19bd...04fa");
        assert_eq!(rows[0].rank, 1);
    }

    #[tokio::test]
    async fn unknown_view_is_bad_request() {
        let err = get_leaderboard(
            Path("stakers".to_string()),
            Query(LeaderboardQuery { filter: None }),
        )
        .await
        .expect_err("unknown view");
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
