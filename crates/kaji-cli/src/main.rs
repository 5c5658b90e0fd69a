use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
use ulid::Ulid;

use kaji_core::app::{AppBuilder, Ticker};
use kaji_core::domain::{
    AssignmentHint, CompletionDraft, DefinitionDraft, HouseholdId, Priority, UserId,
};
use kaji_core::impls::{InMemoryHouseholdDirectory, RecordingEventSink};
use kaji_core::ports::{Clock, FixedClock, HouseholdProfile, OccurrenceFilter};

#[tokio::main]
async fn main() {
    // (A) 依存を用意してスケジューラを組み立てる
    //     デモなので時計は固定（2024-01-01 月曜の朝 9 時、東京）にして、
    //     時間の進みを自分で制御する
    let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let sink = Arc::new(RecordingEventSink::new());
    let directory = Arc::new(InMemoryHouseholdDirectory::new());

    let household = HouseholdId::from_ulid(Ulid::new());
    let alice = UserId::from_ulid(Ulid::new());
    let bob = UserId::from_ulid(Ulid::new());
    directory
        .upsert(HouseholdProfile {
            household,
            timezone: tokyo,
            due_time: None, // その日の終わり（23:59:59）が期限
            members: vec![alice, bob],
        })
        .await;

    let app = AppBuilder::new()
        .clock(clock.clone())
        .event_sink(sink.clone())
        .household_directory(directory)
        .build()
        .expect("default config is valid");
    let scheduler = app.scheduler;

    // (B) 定義を登録する（作成時に最初の水平線分が自動生成される）
    let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let trash = scheduler
        .create_definition(DefinitionDraft {
            household,
            title: "Take out the trash".to_string(),
            description: Some("Burnable on Monday, plastic on Friday".to_string()),
            room: None,
            rrule: "FREQ=WEEKLY;BYDAY=MO,FR".to_string(),
            start_date: monday,
            estimated_minutes: Some(5),
            priority: Priority::High,
            assignment: AssignmentHint::Fixed(alice),
            is_catalog: false,
        })
        .await
        .expect("valid definition");
    println!("created: {} ({})", trash.title, trash.rrule);

    let vacuum = scheduler
        .create_definition(DefinitionDraft {
            household,
            title: "Vacuum the living room".to_string(),
            description: None,
            room: None,
            rrule: "FREQ=DAILY;INTERVAL=2".to_string(),
            start_date: monday,
            estimated_minutes: Some(20),
            priority: Priority::Medium,
            assignment: AssignmentHint::Auto, // メンバーでローテーション
            is_catalog: false,
        })
        .await
        .expect("valid definition");
    println!("created: {} ({})", vacuum.title, vacuum.rrule);

    scheduler
        .create_definition(DefinitionDraft {
            household,
            title: "Clean the range hood filter".to_string(),
            description: None,
            room: None,
            rrule: "FREQ=MONTHLY;BYMONTHDAY=-1".to_string(),
            start_date: monday,
            estimated_minutes: Some(30),
            priority: Priority::Low,
            assignment: AssignmentHint::Auto,
            is_catalog: false,
        })
        .await
        .expect("valid definition");

    // 保存せずにルールの予定日だけ見る
    let preview = scheduler
        .preview_rule("FREQ=WEEKLY;BYDAY=MO,FR", monday, 4)
        .expect("valid rule");
    println!("preview MO,FR from {monday}: {preview:?}");

    // (C) tick 一巡（生成 + sweep）。作成時に生成済みなので全件 already_present
    let report = scheduler.tick().await.expect("tick");
    println!(
        "tick: created={} already_present={} failures={}",
        report.generation.created,
        report.generation.already_present,
        report.generation.failures.len()
    );

    // 2 週間分のボード
    let two_weeks = monday + chrono::Duration::days(13);
    let board = scheduler
        .list_occurrences(household, monday, two_weeks, &OccurrenceFilter::default())
        .await
        .expect("list");
    println!("board ({} occurrences):", board.len());
    for occurrence in &board {
        println!(
            "  {} due={} status={} assignee={:?}",
            occurrence.scheduled_date,
            occurrence.due_at.with_timezone(&tokyo),
            occurrence.status,
            occurrence.assignee,
        );
    }

    // (D) ユーザー操作と時間経過
    //     月曜のゴミ出しを完了、月曜の掃除機がけは水曜までスヌーズ
    let today_trash = board
        .iter()
        .find(|o| o.definition == trash.id && o.scheduled_date == monday)
        .expect("monday occurrence exists");
    let done = scheduler
        .complete_occurrence(
            today_trash.id,
            Some(alice),
            CompletionDraft {
                duration_minutes: Some(4),
                comment: Some("Also rinsed the bins".to_string()),
                photo_url: None,
            },
        )
        .await
        .expect("complete");
    println!("completed {} -> {}", done.scheduled_date, done.status);

    let today_vacuum = board
        .iter()
        .find(|o| o.definition == vacuum.id && o.scheduled_date == monday)
        .expect("monday occurrence exists");
    let wednesday_morning = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
    scheduler
        .snooze_occurrence(today_vacuum.id, wednesday_morning)
        .await
        .expect("snooze");
    println!("snoozed vacuuming until {}", wednesday_morning.with_timezone(&tokyo));

    // 水曜の朝まで時間を進めて sweep
    // スヌーズ明けの掃除機がけは、期限（月曜終わり）も過ぎているので
    // 同じ一回で overdue になる
    clock.set(wednesday_morning);
    let sweep = scheduler.sweep().await.expect("sweep");
    println!(
        "sweep at {}: resumed={} marked_overdue={}",
        clock.now().with_timezone(&tokyo),
        sweep.resumed,
        sweep.marked_overdue
    );

    let stats = scheduler
        .stats(household, monday, two_weeks)
        .await
        .expect("stats");
    println!("stats: {}", serde_json::to_string_pretty(&stats).unwrap());

    // (E) 本番の駆動ループはこの形（デモなのですぐ畳む）
    let ticker = Ticker::spawn(scheduler.clone(), Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(120)).await;
    ticker.shutdown_and_join().await;

    let events = sink.take().await;
    println!("events emitted: {}", events.len());
    for kind in ["reminder_scheduled", "occurrence_overdue", "tick_completed"] {
        let n = events.iter().filter(|e| e.kind() == kind).count();
        println!("  {kind}: {n}");
    }
}
