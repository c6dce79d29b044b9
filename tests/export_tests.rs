use pair_analytics::analytics::export::{ticks_from_ohlc_csv, Table};

#[test]
fn csv_has_header_iso_timestamps_and_blank_nan() {
    let mut table = Table::new(vec!["close_BTCUSDT".to_string(), "zscore".to_string()]);
    table.push_row(0, vec![100.5, f64::NAN]);
    table.push_row(1_500, vec![101.0, -1.25]);

    let text = String::from_utf8(table.to_csv_bytes()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "timestamp,close_BTCUSDT,zscore");
    assert_eq!(lines[1], "1970-01-01T00:00:00.000Z,100.5,");
    assert_eq!(lines[2], "1970-01-01T00:00:01.500Z,101,-1.25");
    assert_eq!(lines.len(), 3);
}

#[test]
fn empty_table_exports_header_only() {
    let table = Table::new(vec!["spread".to_string()]);
    assert!(table.is_empty());
    assert_eq!(table.to_csv_bytes(), b"timestamp,spread\n".to_vec());
}

#[test]
fn ohlc_upload_becomes_close_ticks() {
    let csv = "ts,open,high,low,close,volume\n\
               2024-01-01 00:00:00,1,2,0.5,1.5,10\n\
               2024-01-01 00:00:01,1.5,2,1,1.75,3\n\
               \n\
               2024-01-01 00:00:02,1.75,2,1,,3\n";
    let ticks = ticks_from_ohlc_csv(csv, "UPLOADED").unwrap();
    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[0].symbol, "UPLOADED");
    assert_eq!(ticks[0].timestamp_ms, 1_704_067_200_000);
    assert_eq!(ticks[1].timestamp_ms, 1_704_067_201_000);
    assert_eq!(ticks[1].price, 1.75);
    assert_eq!(ticks[1].qty, 0.0);
}

#[test]
fn upload_without_close_column_is_an_error() {
    assert!(ticks_from_ohlc_csv("ts,open,high\n0,1,2\n", "X").is_err());
    assert!(ticks_from_ohlc_csv("ts,close\nnever,1\n", "X").is_err());
    assert!(ticks_from_ohlc_csv("", "X").unwrap().is_empty());
}
