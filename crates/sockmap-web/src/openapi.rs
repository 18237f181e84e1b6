//! OpenAPI documentation definition.

use sockmap_core::config::TracerConfig;
use sockmap_core::model::{
    MemorySegment, ProcessStatus, ProcessSummary, Protocol, SegmentKind, SocketRecord,
    SocketState, TraceSnapshot,
};
use utoipa::OpenApi;

use crate::handlers::HealthResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::handle_health,
        crate::handlers::handle_trace,
        crate::handlers::handle_sockets,
        crate::handlers::handle_memory,
        crate::handlers::handle_processes,
        crate::handlers::handle_config,
    ),
    components(schemas(
        HealthResponse,
        TraceSnapshot,
        SocketRecord,
        MemorySegment,
        ProcessSummary,
        SocketState,
        Protocol,
        SegmentKind,
        ProcessStatus,
        TracerConfig,
    )),
    info(
        title = "sockmap API",
        version = "1.0",
        description = "Socket, memory, and process tracing API over the Linux proc filesystem"
    )
)]
pub(crate) struct ApiDoc;
