/// Test fixtures: representative JSON payloads from the PurpleAir
/// listing API.
///
/// These fixtures are structurally complete but truncated to the
/// minimum needed to exercise the parser and builder. They reflect the
/// real columnar envelope returned by:
///   https://api.purpleair.com/v1/sensors?fields=...
///
/// Listing response shape:
///   response.fields[]  — column names, authoritative for positions
///   response.data[][]  — one positional array per sensor
///     sensor_index — provider id (JSON number)
///     latitude / longitude — WGS84, may be null for unplaced sensors
///     last_seen    — epoch seconds
///
/// Note: rows are positional, so a missing trailing cell shortens the
/// row rather than appearing as null. Parsers must handle both.

/// Six complete sensors: three stacked due north of the 94110 centroid
/// (37.7485, -122.4156) at 0.48 km / 1.77 km / 8.05 km (0.3 / 1.1 /
/// 5.0 miles), one in Oakland, one in Berkeley, one in Portland.
#[cfg(test)]
pub(crate) fn fixture_bay_area_json() -> &'static str {
    r#"{
      "api_version": "V1.0.11-0.0.41",
      "time_stamp": 1713230000,
      "data_time_stamp": 1713229990,
      "fields": ["sensor_index", "latitude", "longitude", "last_seen"],
      "data": [
        [10001, 37.7528, -122.4156, 1713229900],
        [10002, 37.7644, -122.4156, 1713229910],
        [10003, 37.8209, -122.4156, 1713229920],
        [10004, 37.7800, -122.2200, 1713229930],
        [10005, 37.8640, -122.2450, 1713229940],
        [10006, 45.5200, -122.6750, 1713229950]
      ]
    }"#
}

/// Only the three Mission-district sensors from `fixture_bay_area_json`,
/// for ranking assertions where the exact candidate set matters.
#[cfg(test)]
pub(crate) fn fixture_mission_distances_json() -> &'static str {
    r#"{
      "api_version": "V1.0.11-0.0.41",
      "time_stamp": 1713230000,
      "data_time_stamp": 1713229990,
      "fields": ["sensor_index", "latitude", "longitude", "last_seen"],
      "data": [
        [10003, 37.8209, -122.4156, 1713229920],
        [10001, 37.7528, -122.4156, 1713229900],
        [10002, 37.7644, -122.4156, 1713229910]
      ]
    }"#
}

/// Thirteen rows: seven valid sensors near the Mission plus one of each
/// malformation the builder must drop and count — null coordinates,
/// null id, out-of-range latitude, duplicate id, truncated row, null
/// last_seen.
#[cfg(test)]
pub(crate) fn fixture_with_invalid_rows_json() -> &'static str {
    r#"{
      "api_version": "V1.0.11-0.0.41",
      "time_stamp": 1713230000,
      "data_time_stamp": 1713229990,
      "fields": ["sensor_index", "latitude", "longitude", "last_seen"],
      "data": [
        [20001, 37.7490, -122.4150, 1713229900],
        [20002, null, null, 1713229900],
        [null, 37.7500, -122.4160, 1713229900],
        [20004, 137.0, -122.4000, 1713229900],
        [20001, 37.7495, -122.4155, 1713229905],
        [20005, 37.7502, -122.4162],
        [20006, 37.7510, -122.4140, null],
        [20007, 37.7512, -122.4170, 1713229901],
        [20008, 37.7522, -122.4180, 1713229902],
        [20009, 37.7532, -122.4190, 1713229903],
        [20010, 37.7542, -122.4130, 1713229904],
        [20011, 37.7552, -122.4120, 1713229906],
        [20012, 37.7562, -122.4110, 1713229907]
      ]
    }"#
}

/// One valid record out of five. Well under any sane minimum-valid
/// fraction, so a build over this listing must abort.
#[cfg(test)]
pub(crate) fn fixture_mostly_invalid_json() -> &'static str {
    r#"{
      "api_version": "V1.0.11-0.0.41",
      "time_stamp": 1713230000,
      "data_time_stamp": 1713229990,
      "fields": ["sensor_index", "latitude", "longitude", "last_seen"],
      "data": [
        [30001, 37.7490, -122.4150, 1713229900],
        [30002, null, null, 1713229900],
        [30003, null, -122.4000, 1713229900],
        [null, 37.7500, -122.4160, 1713229900],
        [30005, 200.0, 200.0, 1713229900]
      ]
    }"#
}

/// A well-formed envelope with no sensors at all.
#[cfg(test)]
pub(crate) fn fixture_empty_json() -> &'static str {
    r#"{
      "api_version": "V1.0.11-0.0.41",
      "time_stamp": 1713230000,
      "data_time_stamp": 1713229990,
      "fields": ["sensor_index", "latitude", "longitude", "last_seen"],
      "data": []
    }"#
}

/// Two sensors in Portland only. Against a registry that also carries
/// Salem (97301, ~68 km away) and Bend (97701, ~160 km away), this
/// exercises query-time widening: Salem reaches Portland inside the
/// 150 km cap, Bend does not.
#[cfg(test)]
pub(crate) fn fixture_portland_json() -> &'static str {
    r#"{
      "api_version": "V1.0.11-0.0.41",
      "time_stamp": 1713230000,
      "data_time_stamp": 1713229990,
      "fields": ["sensor_index", "latitude", "longitude", "last_seen"],
      "data": [
        [40001, 45.5200, -122.6750, 1713229900],
        [40002, 45.5800, -122.6400, 1713229910]
      ]
    }"#
}
