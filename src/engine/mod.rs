pub mod alert_engine;
