use std::collections::BTreeMap;

/// Process-wide values layered under every Function, captured once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultOverlay {
    pub bootstrap_servers: String,
    pub function: BTreeMap<String, String>,
    pub consumer: BTreeMap<String, String>,
    pub producer: BTreeMap<String, String>,
}

/// Effective configuration handed to the function runtime, one flat map per namespace.
///
/// Ordered maps keep the rendered property file stable regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionConfig {
    pub function: BTreeMap<String, String>,
    pub consumer: BTreeMap<String, String>,
    pub producer: BTreeMap<String, String>,
}

impl FunctionConfig {
    pub fn override_function_properties<'a, I>(&mut self, props: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        copy_into(props, &mut self.function);
    }

    pub fn override_consumer_properties<'a, I>(&mut self, props: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        copy_into(props, &mut self.consumer);
    }

    pub fn override_producer_properties<'a, I>(&mut self, props: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        copy_into(props, &mut self.producer);
    }
}

fn copy_into<'a, I>(props: I, target: &mut BTreeMap<String, String>)
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    target.extend(props.into_iter().map(|(k, v)| (k.clone(), v.clone())));
}
