//! gRPC server implementation

use std::net::SocketAddr;
use std::sync::Arc;

use fleetmon_api::fleetmon::v1::collector_server::{Collector, CollectorServer};
use fleetmon_api::fleetmon::v1::query_service_server::{
    QueryService as QueryServiceRpc, QueryServiceServer,
};
use fleetmon_api::fleetmon::v1::*;
use fleetmon_core::proto_convert::{
    page_from_proto, profile_from_proto, sort_order_from_proto, time_range_from_proto,
};
use fleetmon_core::types::AnomalyThresholds;
use fleetmon_core::{FleetError, HostManager, QueryService as CoreQueryService};
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument};

/// Push-path service: one method, invoked by worker agents.
pub struct CollectorApi {
    manager: Arc<HostManager>,
}

#[tonic::async_trait]
impl Collector for CollectorApi {
    async fn push_metrics(
        &self,
        request: Request<MonitorInfo>,
    ) -> std::result::Result<Response<PushAck>, Status> {
        let info = request.into_inner();
        match self.manager.ingest(info).await {
            Ok(()) => {
                debug!("gRPC: PushMetrics accepted");
                Ok(Response::new(PushAck {}))
            }
            // Ingest is best-effort: a snapshot without host identity is
            // dropped and logged, never failed back to the worker.
            Err(FleetError::EmptyHostKey) => {
                debug!("gRPC: PushMetrics dropped (empty host identity)");
                Ok(Response::new(PushAck {}))
            }
            Err(e) => Err(Status::internal(e.to_string())),
        }
    }
}

/// Read-path service wrapping the core query layer.
pub struct QueryApi {
    query: Arc<CoreQueryService>,
}

fn to_status(e: FleetError) -> Status {
    match e {
        FleetError::InvalidTimeRange { .. } => Status::invalid_argument(e.to_string()),
        FleetError::BackendUnavailable { .. } => Status::unavailable(e.to_string()),
        other => Status::internal(other.to_string()),
    }
}

#[tonic::async_trait]
impl QueryServiceRpc for QueryApi {
    #[instrument(skip(self, request), fields(host = %request.get_ref().server_name))]
    async fn query_performance(
        &self,
        request: Request<QueryPerformanceRequest>,
    ) -> std::result::Result<Response<QueryPerformanceResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .query
            .query_performance(
                &req.server_name,
                time_range_from_proto(req.time_range),
                page_from_proto(req.pagination),
                profile_from_proto(req.profile),
            )
            .await
            .map_err(to_status)?;
        Ok(Response::new(page.into()))
    }

    #[instrument(skip(self, request), fields(host = %request.get_ref().server_name))]
    async fn query_trend(
        &self,
        request: Request<QueryTrendRequest>,
    ) -> std::result::Result<Response<QueryTrendResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .query
            .query_trend(
                &req.server_name,
                time_range_from_proto(req.time_range),
                req.interval_seconds,
                profile_from_proto(req.profile),
            )
            .await
            .map_err(to_status)?;
        Ok(Response::new(result.into()))
    }

    #[instrument(skip(self, request))]
    async fn query_anomaly(
        &self,
        request: Request<QueryAnomalyRequest>,
    ) -> std::result::Result<Response<QueryAnomalyResponse>, Status> {
        let req = request.into_inner();
        let thresholds = AnomalyThresholds {
            cpu: req.cpu_threshold,
            mem: req.mem_threshold,
            disk: req.disk_threshold,
            change_rate: req.change_rate_threshold,
        };
        let page = self
            .query
            .query_anomaly(
                &req.server_name,
                time_range_from_proto(req.time_range),
                thresholds,
                page_from_proto(req.pagination),
            )
            .await
            .map_err(to_status)?;
        Ok(Response::new(page.into()))
    }

    #[instrument(skip(self, request))]
    async fn query_score_rank(
        &self,
        request: Request<QueryScoreRankRequest>,
    ) -> std::result::Result<Response<QueryScoreRankResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .query
            .query_score_rank(
                sort_order_from_proto(req.order),
                page_from_proto(req.pagination),
                profile_from_proto(req.profile),
            )
            .await
            .map_err(to_status)?;
        Ok(Response::new(page.into()))
    }

    #[instrument(skip(self, request))]
    async fn query_latest_score(
        &self,
        request: Request<QueryLatestScoreRequest>,
    ) -> std::result::Result<Response<QueryLatestScoreResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .query
            .query_latest_score(profile_from_proto(req.profile))
            .await
            .map_err(to_status)?;
        Ok(Response::new(result.into()))
    }

    #[instrument(skip(self, request), fields(host = %request.get_ref().server_name))]
    async fn query_net_detail(
        &self,
        request: Request<QueryDetailRequest>,
    ) -> std::result::Result<Response<QueryNetDetailResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .query
            .query_net_detail(
                &req.server_name,
                time_range_from_proto(req.time_range),
                page_from_proto(req.pagination),
            )
            .await
            .map_err(to_status)?;
        Ok(Response::new(page.into()))
    }

    #[instrument(skip(self, request), fields(host = %request.get_ref().server_name))]
    async fn query_disk_detail(
        &self,
        request: Request<QueryDetailRequest>,
    ) -> std::result::Result<Response<QueryDiskDetailResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .query
            .query_disk_detail(
                &req.server_name,
                time_range_from_proto(req.time_range),
                page_from_proto(req.pagination),
            )
            .await
            .map_err(to_status)?;
        Ok(Response::new(page.into()))
    }

    #[instrument(skip(self, request), fields(host = %request.get_ref().server_name))]
    async fn query_mem_detail(
        &self,
        request: Request<QueryDetailRequest>,
    ) -> std::result::Result<Response<QueryMemDetailResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .query
            .query_mem_detail(
                &req.server_name,
                time_range_from_proto(req.time_range),
                page_from_proto(req.pagination),
            )
            .await
            .map_err(to_status)?;
        Ok(Response::new(page.into()))
    }

    #[instrument(skip(self, request), fields(host = %request.get_ref().server_name))]
    async fn query_soft_irq_detail(
        &self,
        request: Request<QueryDetailRequest>,
    ) -> std::result::Result<Response<QuerySoftIrqDetailResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .query
            .query_softirq_detail(
                &req.server_name,
                time_range_from_proto(req.time_range),
                page_from_proto(req.pagination),
            )
            .await
            .map_err(to_status)?;
        Ok(Response::new(page.into()))
    }

    #[instrument(skip(self, request), fields(host = %request.get_ref().server_name))]
    async fn query_cpu_core_detail(
        &self,
        request: Request<QueryDetailRequest>,
    ) -> std::result::Result<Response<QueryCpuCoreDetailResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .query
            .query_cpu_core_detail(
                &req.server_name,
                time_range_from_proto(req.time_range),
                page_from_proto(req.pagination),
            )
            .await
            .map_err(to_status)?;
        Ok(Response::new(page.into()))
    }
}

/// Run both gRPC services until a shutdown signal arrives.
pub async fn serve(
    addr: SocketAddr,
    manager: Arc<HostManager>,
    query: Arc<CoreQueryService>,
) -> anyhow::Result<()> {
    info!("Starting gRPC server on {addr}");

    Server::builder()
        .add_service(CollectorServer::new(CollectorApi { manager }))
        .add_service(QueryServiceServer::new(QueryApi { query }))
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
