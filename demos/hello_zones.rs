use advertol_engine::{
    AdvertolEngine, Element, ElementClasses, ElementClassesControl, EngineConfig, EngineError, EngineEvent,
    MediaQueryContext, SlotCommand, SlotService, Viewport, ZoneId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    env_logger::init();

    // Every zone that has a slot path is filled by the slot service. Zones without one are
    // reported empty.
    let slots = [
        (ZoneId::new("sidebar")?, "/1234/sidebar".to_string()),
        (ZoneId::new("inline")?, "/1234/inline".to_string()),
    ];
    let (slot_service, mut commands) = SlotService::new(slots);
    let slot_service = Arc::new(slot_service);

    // Stand-in for the ad SDK: every refreshed slot renders, and fills, right away.
    let sdk_service = slot_service.clone();
    tokio::spawn(async move {
        while let Some(cmd) = commands.recv().await {
            println!("sdk <- {cmd:?}");
            if let SlotCommand::Refresh { zone_ids } = cmd {
                for zone_id in zone_ids {
                    sdk_service.render_ended(&zone_id, true);
                }
            }
        }
    });

    // Sidebar on wide screens, inline on narrow ones, footer everywhere.
    let media = Arc::new(MediaQueryContext::from_json(
        Viewport::new(1280, 800),
        r#"{
            "(min-width: 1000px)": ["sidebar", "footer"],
            "(max-width: 999px)": ["inline", "footer"]
        }"#,
    )?);

    let classes = ElementClasses {
        is_visible: "zone--visible".into(),
        is_hidden: "zone--hidden".into(),
        is_loaded: "zone--loaded".into(),
        is_empty: "zone--empty".into(),
    };

    let engine = AdvertolEngine::builder()
        .config(EngineConfig::builder().max_zones(8).build()?)
        .service(slot_service)
        .zone("sidebar", Element::new("zone-sidebar"))
        .zone("inline", Element::new("zone-inline"))
        .zone("footer", Element::new("zone-footer"))
        .control(Arc::new(ElementClassesControl::new(classes)))
        .context(media.clone())
        .build()?;

    let mut event_rx = engine.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            println!("event: {event:?}");
            if event == EngineEvent::EngineDestroyed {
                break;
            }
        }
    });

    let listener = engine.start()?;

    let partition = engine.resolve().await?;
    println!("visible: {:?}, hidden: {:?}", partition.visible, partition.hidden);

    // Shrinking the viewport flips both media queries; the context asks for a new round, which
    // the listener runs.
    media.set_viewport(Viewport::new(800, 600));
    sleep(Duration::from_millis(100)).await;

    for id in engine.zone_ids() {
        if let Some(zone) = engine.zone(id.as_str()) {
            println!("{id}: {:?} classes {:?}", zone.flags(), zone.element().classes());
        }
    }

    engine.destroy();
    let _ = listener.await;
    sleep(Duration::from_millis(10)).await;

    Ok(())
}
