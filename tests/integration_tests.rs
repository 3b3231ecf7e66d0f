use serde_json::Value;
use water_balance::*;

const SITE_CSV: &str = "\
meter_label,account_number,label,zone,type,parent_meter,jan_25,feb_25,mar_25
Main Bulk (NAMA),C43659,L1,Main Bulk,Main Bulk,,10000,11000,12000
ZONE 8 (Bulk Zone 8),4300342,L2,Zone_08,Zone Bulk,Main Bulk (NAMA),3000,3200,3400
ZONE 3A (Bulk Zone 3A),4300343,L2,Zone_03_(A),Zone Bulk,Main Bulk (NAMA),5000,5200,5400
Irrigation Tank 01,4300294,DC,Direct Connection,IRR_Servies,Main Bulk (NAMA),500,520,540
Hotel Main Building,4300334,DC,Direct Connection,Retail,Main Bulk (NAMA),1500,1600,1700
Z8-11,4300023,L3,Zone_08,Residential (Villa),ZONE 8 (Bulk Zone 8),1200,1300,1400
Z8-12,4300024,L3,Zone_08,Residential (Villa),ZONE 8 (Bulk Zone 8),1100,,1250
D-44 Building Bulk Meter,4300144,L3,Zone_03_(A),D_Building_Bulk,ZONE 3A (Bulk Zone 3A),3600,3700,3900
Z3-44(1A),4300145,L4,Zone_03_(A),Residential (Apart),D-44 Building Bulk Meter,1700,1800,1850
Z3-44(2A),4300146,L4,Zone_03_(A),Residential (Apart),D-44 Building Bulk Meter,1600,1650,1700
Z3-44 Common,4300147,L4,Zone_03_(A),D_Building_Common,D-44 Building Bulk Meter,150,160,170
";

const TEXT_COLUMNS: [&str; 6] = [
    "meter_label",
    "account_number",
    "label",
    "zone",
    "type",
    "parent_meter",
];

/// Reads an exported meter sheet. Blank cells other than the meter label are
/// nulls; reading cells that do not parse as numbers are passed through as text.
fn rows_from_csv(data: &str) -> anyhow::Result<Vec<RawMeterRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut object = serde_json::Map::new();

        for (header, field) in headers.iter().zip(record.iter()) {
            let value = if header == "meter_label" {
                Value::String(field.to_string())
            } else if field.is_empty() {
                Value::Null
            } else if TEXT_COLUMNS.contains(&header) {
                Value::String(field.to_string())
            } else {
                match field.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                    Some(n) => Value::Number(n),
                    None => Value::String(field.to_string()),
                }
            };
            object.insert(header.to_string(), value);
        }

        rows.push(serde_json::from_value(Value::Object(object))?);
    }

    Ok(rows)
}

fn records_from_csv(processor: &WaterBalanceProcessor, csv: &str) -> anyhow::Result<Vec<MeterRecord>> {
    let rows = rows_from_csv(csv)?;
    Ok(processor.ingest(&rows)?)
}

fn site_records(processor: &WaterBalanceProcessor) -> anyhow::Result<Vec<MeterRecord>> {
    records_from_csv(processor, SITE_CSV)
}

fn jan(id: &str, level: Level, value: f64) -> MeterRecord {
    MeterRecord::new(id, level).with_reading("jan_25", value)
}

#[test]
fn test_site_snapshot_cascade() -> anyhow::Result<()> {
    let processor = WaterBalanceProcessor::with_defaults()?;
    let records = site_records(&processor)?;
    assert_eq!(records.len(), 11);
    assert_eq!(records[0].id, "C43659");
    assert!(records[6].reading("feb_25").is_missing());

    let window = processor.window(0, 2)?;
    let cascade = processor.cascade(&records, &window);

    assert_eq!(cascade.meter_counts.l3, 3);
    assert_eq!(cascade.a1, 33000.0);
    assert_eq!(cascade.a2, 31560.0);
    assert_eq!(cascade.a3_bulk, 23810.0);
    assert_eq!(cascade.a3_individual, 23390.0);
    assert_eq!(cascade.stage1_loss, 1440.0);
    assert_eq!(cascade.stage2_loss, 8170.0);
    assert_eq!(cascade.stage3_loss, 420.0);
    assert!((cascade.stage1_loss_percentage - 1440.0 / 33000.0 * 100.0).abs() < 1e-9);
    assert!((cascade.system_efficiency - 23390.0 / 33000.0 * 100.0).abs() < 1e-9);

    println!("✓ Site cascade: A1={} A2={} A3={}", cascade.a1, cascade.a2, cascade.a3_individual);
    Ok(())
}

#[test]
fn test_site_snapshot_validation() -> anyhow::Result<()> {
    let processor = WaterBalanceProcessor::with_defaults()?;
    let records = site_records(&processor)?;

    let output = processor.process(&records, "residential", 0, 2)?;
    let report = &output.report;
    assert!(report.is_valid, "{:#?}", report);
    assert_eq!(report.summary.total_meters, 4);
    assert_eq!(report.summary.total_consumption, 16550.0);
    assert_eq!(report.warnings, vec!["Meter Z8-12 has no data for feb_25".to_string()]);
    assert!(report.discrepancies.is_empty());
    assert!(report.recommendations.is_empty());
    assert_eq!(report.relationships.l1_to_l2.difference, 7800.0);

    let irrigation = processor.process(&records, "irrigation", 0, 2)?;
    assert_eq!(irrigation.report.verification.total, 1560.0);
    assert_eq!(irrigation.report.verification.meter_count, 1);
    assert!(irrigation.report.is_valid);

    Ok(())
}

#[test]
fn test_site_snapshot_zones_and_types() -> anyhow::Result<()> {
    let processor = WaterBalanceProcessor::with_defaults()?;
    let records = site_records(&processor)?;
    let window = processor.window(0, 2)?;

    let zones = processor.zone_balances(&records, &window);
    let names: Vec<&str> = zones.iter().map(|z| z.zone.as_str()).collect();
    assert_eq!(names, vec!["Zone_03_(A)", "Zone_08"]);
    assert_eq!(zones[0].bulk_total, 15600.0);
    assert_eq!(zones[0].individual_total, 11200.0);
    assert_eq!(zones[1].difference, 3350.0);
    assert_eq!(zones[1].individual_meter_count, 2);

    let by_type = processor.consumption_by_type(&records, &window);
    let categories: Vec<&str> = by_type.iter().map(|t| t.category.as_str()).collect();
    assert_eq!(
        categories,
        vec!["Building", "Bulk", "Commercial", "Common", "Irrigation", "Residential"]
    );
    let residential = by_type.iter().find(|t| t.category == "Residential").unwrap();
    assert_eq!(residential.meter_count, 4);
    assert_eq!(residential.total, 16550.0);

    let zone_8 = processor.monthly_breakdown(
        &records,
        &window,
        &MeterFilter::new().zone("zone 08").level(Level::L3),
    );
    let totals: Vec<f64> = zone_8.iter().map(|m| m.total).collect();
    assert_eq!(totals, vec![2300.0, 1300.0, 2650.0]);
    assert_eq!(zone_8[2].label, "Mar-25");

    Ok(())
}

#[test]
fn test_cross_check_clean_for_every_window() -> anyhow::Result<()> {
    let processor = WaterBalanceProcessor::with_defaults()?;
    let records = site_records(&processor)?;
    let months = processor.calendar().len();

    for start in 0..months {
        for end in start..months {
            let window = processor.window(start, end)?;
            for category in ["irrigation", "commercial", "residential", "common"] {
                let report = processor.validate_category(&records, category, &window);
                assert!(
                    report.discrepancies.is_empty(),
                    "{} over {}: {:?}",
                    category,
                    window,
                    report.discrepancies
                );
            }
        }
    }

    Ok(())
}

#[test]
fn test_window_resolution_round_trip() -> anyhow::Result<()> {
    let calendar = MonthCalendar::from_keys(&DEFAULT_MONTH_KEYS)?;
    let all = calendar.keys();

    for i in 0..calendar.len() {
        for j in i..calendar.len() {
            let window = calendar.resolve(i, j)?;
            assert_eq!(window.len(), j - i + 1);
            assert_eq!(window.keys(), &all[i..=j]);
        }
    }

    assert!(calendar.resolve(3, 2).is_err());
    assert!(calendar.resolve(0, calendar.len()).is_err());
    Ok(())
}

#[test]
fn test_basic_cascade_scenario() -> anyhow::Result<()> {
    let calendar = MonthCalendar::from_keys(&DEFAULT_MONTH_KEYS)?;
    let window = calendar.resolve(0, 0)?;
    let records = vec![
        jan("l1", Level::L1, 1000.0),
        jan("l2", Level::L2, 900.0),
        jan("l3", Level::L3, 850.0),
        jan("l4", Level::L4, 800.0),
    ];

    let m = compute_cascade(&records, &window);
    assert_eq!((m.a1, m.a2, m.a3_bulk, m.a3_individual), (1000.0, 900.0, 850.0, 800.0));
    assert_eq!((m.stage1_loss, m.stage2_loss, m.stage3_loss), (100.0, 100.0, 50.0));
    assert_eq!(format!("{:.1}", m.stage1_loss_percentage), "10.0");
    assert_eq!(format!("{:.1}", m.stage2_loss_percentage), "11.1");
    assert_eq!(format!("{:.1}", m.stage3_loss_percentage), "5.9");
    Ok(())
}

#[test]
fn test_zero_denominator_scenario() -> anyhow::Result<()> {
    let calendar = MonthCalendar::from_keys(&DEFAULT_MONTH_KEYS)?;
    let window = calendar.resolve(0, 0)?;
    let records = vec![
        jan("l2", Level::L2, 900.0),
        jan("l3", Level::L3, 850.0),
        jan("l4", Level::L4, 800.0),
    ];

    let m = compute_cascade(&records, &window);
    assert_eq!(m.a1, 0.0);
    assert_eq!(m.stage1_loss_percentage, 0.0);
    assert_eq!(m.total_loss_percentage, 0.0);
    assert_eq!(m.system_efficiency, 0.0);
    Ok(())
}

#[test]
fn test_relationship_violation_scenario() -> anyhow::Result<()> {
    let calendar = MonthCalendar::from_keys(&DEFAULT_MONTH_KEYS)?;
    let window = calendar.resolve(0, 0)?;
    let records = vec![jan("l1", Level::L1, 1000.0), jan("l2", Level::L2, 1250.0)];

    let report = check_hierarchy_relationships(&records, &window);
    assert!(!report.is_valid);
    assert_eq!(
        report.errors[0],
        "L2 total (1250) exceeds L1 total (1000) - impossible without external source"
    );
    Ok(())
}

#[test]
fn test_fuzzy_classification_scenario() {
    let usage = Classifier::usage_types();
    assert_eq!(
        usage.match_rule(Some("Garden-Irrig_Servies"), "irrigation"),
        Some(MatchRule::Keyword)
    );
    assert!(usage.matches(Some("Garden-Irrig_Servies"), "irrigation"));
    assert!(!usage.matches(None, "irrigation"));
}

#[test]
fn test_malformed_row_is_rejected() -> anyhow::Result<()> {
    let processor = WaterBalanceProcessor::with_defaults()?;
    let csv = "meter_label,label,jan_25\nOK,L1,10\n,L2,5\n";
    let rows = rows_from_csv(csv)?;
    assert!(matches!(
        processor.ingest(&rows),
        Err(WaterBalanceError::MalformedRecord { index: 1, .. })
    ));
    Ok(())
}

#[test]
fn test_text_reading_is_reported_not_fatal() -> anyhow::Result<()> {
    let processor = WaterBalanceProcessor::with_defaults()?;
    let csv = "\
meter_label,label,type,jan_25,feb_25
Main,L1,Main Bulk,100,100
Zone,L2,Zone Bulk,95,95
Shop 1,DC,Retail,40,n/a
Shop 2,DC,Retail,30,35
";
    let records = records_from_csv(&processor, csv)?;
    let output = processor.process(&records, "commercial", 0, 1)?;

    assert!(!output.report.is_valid);
    assert_eq!(
        output.report.errors,
        vec!["Meter Shop 1 has invalid data type for feb_25: string".to_string()]
    );
    assert_eq!(output.report.summary.skipped_meters, 1);
    assert_eq!(
        output.report.discrepancies,
        vec!["Total consumption mismatch: Validation=65, Verification=105".to_string()]
    );
    assert_eq!(output.cascade.a2, 295.0);
    Ok(())
}

#[test]
fn test_config_from_file() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join("water_balance_config_test.json");
    std::fs::write(
        &path,
        r#"{
            "month_keys": ["dec_24", "jan_25", "feb_25"],
            "thresholds": {"high_consumption_volume": 500},
            "treatment_rates": {"tanker_fee": 6.0}
        }"#,
    )?;

    let config = EngineConfig::from_json_file(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(config.thresholds.high_consumption_volume, 500.0);
    assert_eq!(config.treatment_rates.tanker_fee, 6.0);
    assert_eq!(config.treatment_rates.tse_saving_per_cubic_meter, 0.45);

    let processor = WaterBalanceProcessor::new(config)?;
    let records = vec![MeterRecord::new("villa", Level::L3)
        .with_usage_type("Residential (Villa)")
        .with_reading("dec_24", 300.0)
        .with_reading("jan_25", 250.0)];
    let window = processor.window(0, 1)?;
    let report = processor.validate_category(&records, "residential", &window);
    assert_eq!(
        report.warnings,
        vec!["Meter villa has unusually high consumption: 550 m³".to_string()]
    );
    assert_eq!(window.labels(), vec!["Dec-24".to_string(), "Jan-25".to_string()]);
    Ok(())
}

#[test]
fn test_treatment_plant_period() -> anyhow::Result<()> {
    let processor = WaterBalanceProcessor::with_defaults()?;
    let records = treatment_records_from_json(
        r#"[
            {"operation_date": "2024-07-05", "total_inlet_sewage": 85, "tse_water_to_irrigation": 75, "tankers_discharged": 3},
            {"operation_date": "2024-07-15", "total_inlet_sewage": 92, "tse_water_to_irrigation": 82, "tankers_discharged": 4,
             "income_from_tankers": 20.0, "saving_from_tse": 36.9, "total_saving_income": 56.9},
            {"operation_date": "2024-08-08", "total_inlet_sewage": 88, "tse_water_to_irrigation": 79, "tankers_discharged": 5},
            {"operation_date": "2024-09-12", "total_inlet_sewage": 82, "tse_water_to_irrigation": 72, "tankers_discharged": 4}
        ]"#,
    )?;

    let metrics = processor.treatment_metrics(&records, "2024-07:2024-08")?;
    assert_eq!(metrics.record_count, 3);
    assert_eq!(metrics.total_tankers, 12);
    assert_eq!(metrics.total_income, 60.0);
    assert!((metrics.total_impact - (48.75 + 56.9 + 60.55)).abs() < 1e-9);

    let monthly = processor.treatment_monthly_summary(&records, "2024-07:2024-09")?;
    let months: Vec<&str> = monthly.iter().map(|m| m.month.as_str()).collect();
    assert_eq!(months, vec!["2024-07", "2024-08", "2024-09"]);
    assert_eq!(monthly[0].metrics.record_count, 2);

    assert!(processor.treatment_metrics(&records, "2024-13").is_err());
    Ok(())
}

#[test]
fn test_schema_generation() -> anyhow::Result<()> {
    let schema = RawMeterRow::schema_as_json()?;
    assert!(schema.contains("meter_label"));
    assert!(schema.contains("parent_meter"));
    println!("✓ Schema generated ({} bytes)", schema.len());
    Ok(())
}

#[test]
fn test_report_json_shape() -> anyhow::Result<()> {
    let processor = WaterBalanceProcessor::with_defaults()?;
    let records = site_records(&processor)?;
    let output = processor.process(&records, "irrigation", 0, 2)?;

    let value: Value = serde_json::from_str(&output.to_json()?)?;
    for key in [
        "is_valid",
        "errors",
        "warnings",
        "summary",
        "discrepancies",
        "recommendations",
    ] {
        assert!(value["report"].get(key).is_some(), "missing {}", key);
    }
    assert_eq!(value["report"]["summary"]["validated_meters"], 1);
    assert_eq!(value["cascade"]["months"][0], "jan_25");
    Ok(())
}
