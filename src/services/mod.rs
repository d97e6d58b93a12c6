/// Challenge invitation lifecycle and quiz authoring.
pub mod challenge_service;
/// Live duel coordination: join, scoring, completion, winner resolution.
pub mod coordinator;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Result persistence client for completed quiz attempts.
pub mod results;
/// Storage connection supervisor with reconnection and degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
