pub const INSERT_DEVICE_EVENT: &str = r#"
INSERT INTO device_events (device_id, event_type, latitude, longitude, battery_voltage, event_time, received_at, chase_session_id, payload)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9);
"#;

pub const SELECT_DEVICE_EVENTS: &str = r#"
SELECT device_id, event_type, latitude, longitude, battery_voltage, event_time, received_at, chase_session_id, payload
FROM device_events
WHERE device_id = $1
ORDER BY received_at;
"#;

pub const SELECT_ALL_EVENTS: &str = r#"
SELECT device_id, event_type, latitude, longitude, battery_voltage, event_time, received_at, chase_session_id, payload
FROM device_events
ORDER BY received_at;
"#;
