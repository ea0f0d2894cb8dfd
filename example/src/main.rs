use std::collections::HashMap;

use brace_templates::{ApplyOptions, Engine, EscapeFilter, ItemValue, MapItemSource};

fn main() {
    tracing_subscriber::fmt().init();

    let items = MapItemSource::new(HashMap::from([
        ("USER".to_string(), ItemValue::from("Ada")),
        ("TAGS".to_string(), ItemValue::from("rust:templates:demo")),
        ("SHOW_TAGS".to_string(), ItemValue::from("Y")),
        ("NOTE".to_string(), ItemValue::from("<b>unsafe</b> markup")),
    ]));

    let mut engine = Engine::new().with_items(Box::new(items));
    engine.define_templates(&[
        ("TAG", "<span class=\"tag\">&LABEL.</span>"),
        (
            "REPORT",
            concat!(
                "<h1>Hello &USER., welcome to #APP_NAME#</h1>\n",
                "{if SHOW_TAGS/}{loop TAGS/}{with/}LABEL:= &APEX$ITEM.{apply TAG/}{endloop/}{endif/}\n",
                "<p>&NOTE.</p>\n",
                "<p>&NOTE!STRIPHTML.</p>",
            ),
        ),
    ]);

    let options = ApplyOptions {
        placeholders: Some(HashMap::from([(
            "APP_NAME".to_string(),
            "brace-templates".to_string(),
        )])),
        default_escape_filter: EscapeFilter::Html,
        ..ApplyOptions::default()
    };

    match engine.apply_template("{apply REPORT/}", &options) {
        Ok(rendered) => {
            println!("{}", rendered.text);
            for diagnostic in &rendered.diagnostics {
                eprintln!("{:?}: {}", diagnostic.severity, diagnostic.message);
            }
        }
        Err(err) => eprintln!("render failed: {err}"),
    }
}
