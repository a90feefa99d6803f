pub mod telemetry_dto;
