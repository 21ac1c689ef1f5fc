//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos que mapean al schema
//! PostgreSQL y las reglas puras de transición de estado.

pub mod auth;
pub mod dashboard;
pub mod fine;
pub mod freight_order;
pub mod inventory;
pub mod journey;
pub mod notification;
pub mod vehicle;
pub mod vehicle_cost;
