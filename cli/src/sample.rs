//! Extension points and implementations of the sample host.

use std::sync::Arc;

use flow_spi::{
    BoxError, Extension, ExtensionPointInfo, Factory, Registry, StaticSource,
};

/// Serializes text into some output format.
pub trait DataConverter: Send + Sync {
    fn serialize(&self, input: &str) -> String;
}

/// Greets someone. Every lookup creates a new greeter.
pub trait Greeter: Send + Sync {
    fn greet(&self, who: &str) -> String;
}

pub const CONVERTER: &str = "flow.sample.DataConverter";
pub const GREETER: &str = "flow.sample.Greeter";

const MODULE: &str = "flow-spi-cli";

pub struct JsonConverter;

impl DataConverter for JsonConverter {
    fn serialize(&self, input: &str) -> String {
        format!("JSON:{}", input)
    }
}

impl Extension<dyn DataConverter> for JsonConverter {
    const NAME: Option<&'static str> = Some("json");

    fn create() -> Result<Self, BoxError> {
        Ok(JsonConverter)
    }

    fn into_extension(self: Arc<Self>) -> Arc<dyn DataConverter> {
        self
    }
}

pub struct XmlConverter;

impl DataConverter for XmlConverter {
    fn serialize(&self, input: &str) -> String {
        format!("<xml>{}</xml>", input)
    }
}

impl Extension<dyn DataConverter> for XmlConverter {
    const NAME: Option<&'static str> = Some("xml");
    const PRIORITY: i32 = 100;

    fn create() -> Result<Self, BoxError> {
        Ok(XmlConverter)
    }

    fn into_extension(self: Arc<Self>) -> Arc<dyn DataConverter> {
        self
    }
}

pub struct EnglishGreeter;

impl Greeter for EnglishGreeter {
    fn greet(&self, who: &str) -> String {
        format!("Hello, {}!", who)
    }
}

impl Extension<dyn Greeter> for EnglishGreeter {
    fn create() -> Result<Self, BoxError> {
        Ok(EnglishGreeter)
    }

    fn into_extension(self: Arc<Self>) -> Arc<dyn Greeter> {
        self
    }
}

pub struct PirateGreeter;

impl Greeter for PirateGreeter {
    fn greet(&self, who: &str) -> String {
        format!("Ahoy, {}!", who)
    }
}

impl Extension<dyn Greeter> for PirateGreeter {
    const NAME: Option<&'static str> = Some("pirate");
    const PRIORITY: i32 = 10;

    fn create() -> Result<Self, BoxError> {
        Ok(PirateGreeter)
    }

    fn into_extension(self: Arc<Self>) -> Arc<dyn Greeter> {
        self
    }
}

/// Discovery resources compiled into the binary, placed below `directory`
/// like the resources of any other root.
pub fn resources(directory: &str) -> StaticSource {
    StaticSource::default()
        .with(
            MODULE,
            format!("{}/{}", directory, CONVERTER),
            include_str!("../resources/META-INF/flow-engine/flow.sample.DataConverter"),
        )
        .with(
            MODULE,
            format!("{}/{}", directory, GREETER),
            include_str!("../resources/META-INF/flow-engine/flow.sample.Greeter"),
        )
}

/// Declares the sample extension points on `reg` and makes their
/// implementations resolvable.
pub fn install(reg: &Registry) {
    reg.declare::<dyn DataConverter>(ExtensionPointInfo::new(CONVERTER).with_default("json"));
    reg.declare::<dyn Greeter>(ExtensionPointInfo::new(GREETER).transient());

    reg.register_factory(
        Factory::<dyn DataConverter>::of::<JsonConverter>().with_ref("flow.sample.JsonConverter"),
    );
    reg.register_factory(
        Factory::<dyn DataConverter>::of::<XmlConverter>().with_ref("flow.sample.XmlConverter"),
    );
    reg.register_factory(
        Factory::<dyn Greeter>::of::<EnglishGreeter>().with_ref("flow.sample.EnglishGreeter"),
    );
    reg.register_factory(
        Factory::<dyn Greeter>::of::<PirateGreeter>().with_ref("flow.sample.PirateGreeter"),
    );
}
