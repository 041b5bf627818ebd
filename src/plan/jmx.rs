//! Event-level edits of plan XML documents.
//!
//! The plan file is the external tool's own format; we only ever touch the
//! `testname` attribute of the root test-plan element and the text of named
//! `stringProp`/`boolProp` children. Everything else must round-trip
//! untouched.

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// Read the value of `attr` on the first `tag` element.
pub fn read_attr(xml: &str, tag: &str, attr: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == tag.as_bytes() => {
                for a in e.attributes() {
                    let a = a?;
                    if a.key.as_ref() == attr.as_bytes() {
                        return Ok(Some(a.unescape_value()?.into_owned()));
                    }
                }
                return Ok(None);
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Rewrite `attr` on every `tag` element, returning the updated document.
pub fn write_attr(xml: &str, tag: &str, attr: &str, value: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == tag.as_bytes() => {
                writer.write_event(Event::Start(set_attr(&e, attr, value)?))?;
            }
            Event::Empty(e) if e.name().as_ref() == tag.as_bytes() => {
                writer.write_event(Event::Empty(set_attr(&e, attr, value)?))?;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }
    bytes_to_string(writer.into_inner().into_inner())
}

/// Read the text of the first `tag` element whose `name` attribute is `name`.
pub fn read_prop_text(xml: &str, tag: &str, name: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == tag.as_bytes() && attr_eq(&e, "name", name) => {
                let text = reader.read_text(e.name())?;
                return Ok(Some(text.trim().to_string()));
            }
            Event::Empty(e) if e.name().as_ref() == tag.as_bytes() && attr_eq(&e, "name", name) => {
                return Ok(Some(String::new()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Replace the text of every `tag` element whose `name` attribute is `name`.
pub fn write_prop_text(xml: &str, tag: &str, name: &str, value: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == tag.as_bytes() && attr_eq(&e, "name", name) => {
                writer.write_event(Event::Start(e.to_owned()))?;
                writer.write_event(Event::Text(BytesText::new(value)))?;
                // drop the old content up to the matching close tag
                let mut depth = 1u32;
                loop {
                    match reader.read_event()? {
                        Event::Start(_) => depth += 1,
                        Event::End(end) => {
                            depth -= 1;
                            if depth == 0 {
                                writer.write_event(Event::End(end.to_owned()))?;
                                break;
                            }
                        }
                        Event::Eof => bail!("unclosed <{tag}> element"),
                        _ => {}
                    }
                }
            }
            Event::Empty(e) if e.name().as_ref() == tag.as_bytes() && attr_eq(&e, "name", name) => {
                // self-closing prop gains a text child
                writer.write_event(Event::Start(e.to_owned()))?;
                writer.write_event(Event::Text(BytesText::new(value)))?;
                writer.write_event(Event::End(BytesEnd::new(tag.to_string())))?;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
    }
    bytes_to_string(writer.into_inner().into_inner())
}

fn attr_eq(e: &BytesStart, key: &str, value: &str) -> bool {
    e.attributes().flatten().any(|a| {
        a.key.as_ref() == key.as_bytes()
            && a.unescape_value().map(|v| v == value).unwrap_or(false)
    })
}

fn set_attr(e: &BytesStart, attr: &str, value: &str) -> Result<BytesStart<'static>> {
    let tag = std::str::from_utf8(e.name().as_ref())
        .context("element name is not utf-8")?
        .to_string();
    let mut out = BytesStart::new(tag);
    let mut seen = false;
    for a in e.attributes() {
        let a = a?;
        let key = std::str::from_utf8(a.key.as_ref()).context("attribute key is not utf-8")?;
        if key == attr {
            out.push_attribute((key, value));
            seen = true;
        } else {
            out.push_attribute((key, a.unescape_value()?.as_ref()));
        }
    }
    if !seen {
        out.push_attribute((attr, value));
    }
    Ok(out)
}

fn bytes_to_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).context("rewritten XML is not utf-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<jmeterTestPlan version="1.2" properties="5.0">
  <hashTree>
    <TestPlan guiclass="TestPlanGui" testclass="TestPlan" testname="old name" enabled="true">
      <stringProp name="TestPlan.comments">hello</stringProp>
      <boolProp name="TestPlan.functional_mode">false</boolProp>
      <boolProp name="TestPlan.tearDown_on_shutdown">true</boolProp>
      <stringProp name="TestPlan.user_define_classpath"/>
    </TestPlan>
    <hashTree/>
  </hashTree>
</jmeterTestPlan>
"#;

    #[test]
    fn reads_testname_attribute() {
        let name = read_attr(SAMPLE, "TestPlan", "testname").unwrap();
        assert_eq!(name.as_deref(), Some("old name"));
    }

    #[test]
    fn missing_attribute_is_none() {
        assert_eq!(read_attr(SAMPLE, "TestPlan", "nope").unwrap(), None);
        assert_eq!(read_attr(SAMPLE, "NoSuchTag", "testname").unwrap(), None);
    }

    #[test]
    fn rewrites_testname_attribute() {
        let out = write_attr(SAMPLE, "TestPlan", "testname", "smoke & spike").unwrap();
        assert_eq!(
            read_attr(&out, "TestPlan", "testname").unwrap().as_deref(),
            Some("smoke & spike")
        );
        // untouched siblings survive
        assert_eq!(
            read_prop_text(&out, "stringProp", "TestPlan.comments").unwrap().as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn reads_prop_text() {
        assert_eq!(
            read_prop_text(SAMPLE, "boolProp", "TestPlan.functional_mode").unwrap().as_deref(),
            Some("false")
        );
        assert_eq!(
            read_prop_text(SAMPLE, "stringProp", "TestPlan.user_define_classpath")
                .unwrap()
                .as_deref(),
            Some("")
        );
        assert_eq!(read_prop_text(SAMPLE, "stringProp", "missing").unwrap(), None);
    }

    #[test]
    fn rewrites_prop_text() {
        let out = write_prop_text(SAMPLE, "boolProp", "TestPlan.functional_mode", "true").unwrap();
        assert_eq!(
            read_prop_text(&out, "boolProp", "TestPlan.functional_mode").unwrap().as_deref(),
            Some("true")
        );
        // the other bool is untouched
        assert_eq!(
            read_prop_text(&out, "boolProp", "TestPlan.tearDown_on_shutdown")
                .unwrap()
                .as_deref(),
            Some("true")
        );
    }

    #[test]
    fn rewrites_self_closing_prop() {
        let out =
            write_prop_text(SAMPLE, "stringProp", "TestPlan.user_define_classpath", "lib/ext")
                .unwrap();
        assert_eq!(
            read_prop_text(&out, "stringProp", "TestPlan.user_define_classpath")
                .unwrap()
                .as_deref(),
            Some("lib/ext")
        );
    }
}
