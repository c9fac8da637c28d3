//! Late-bound COM adapter for the live SAP GUI scripting object tree.
//!
//! The scripting engine only exposes `IDispatch`, so every call goes through
//! `GetIDsOfNames`/`Invoke`. All SAP control-path strings live in the
//! `field_path`/`control_action` registries at the bottom of this file; the
//! rest of the crate only ever names logical ids.
//!
//! COM is initialized apartment-threaded by [`ComEngineProvider::new`] and
//! torn down when the provider is dropped. The wrapped objects are bound to
//! that apartment, which is why none of the boundary traits require `Send`.

use log::debug;
use windows::core::{w, BSTR, GUID, IUnknown, Interface, PCWSTR, VARIANT};
use windows::Win32::System::Com::{
    CLSIDFromProgID, CoInitializeEx, CoUninitialize, IDispatch, COINIT_APARTMENTTHREADED,
    DISPATCH_FLAGS, DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT, DISPPARAMS,
};
use windows::Win32::System::Ole::GetActiveObject;

use super::{
    controls, ControlId, Field, FieldId, GuiConnection, GuiEngine, GuiError, GuiResult,
    GuiSession, GuiWindow, VKey,
};

const LOCALE_USER_DEFAULT: u32 = 0x0400;
const DISPID_PROPERTYPUT: i32 = -3;

/// The running-object-table name the client registers itself under.
const ENGINE_PROG_ID: PCWSTR = w!("SAPGUI");

impl From<windows::core::Error> for GuiError {
    fn from(err: windows::core::Error) -> Self {
        GuiError::Call(err.message().to_string())
    }
}

fn dispid(object: &IDispatch, name: &str) -> GuiResult<i32> {
    let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
    let names = [PCWSTR(wide.as_ptr())];
    let mut id = 0i32;
    unsafe {
        object.GetIDsOfNames(&GUID::zeroed(), names.as_ptr(), 1, LOCALE_USER_DEFAULT, &mut id)
    }
    .map_err(|e| GuiError::Call(format!("'{name}' is not scriptable: {}", e.message())))?;
    Ok(id)
}

/// Late-bound `IDispatch::Invoke`. Arguments are passed in call order and
/// reversed here, as `rgvarg` expects.
fn invoke(
    object: &IDispatch,
    name: &str,
    flags: DISPATCH_FLAGS,
    args: &[VARIANT],
) -> GuiResult<VARIANT> {
    let member = dispid(object, name)?;
    let mut reversed: Vec<VARIANT> = args.iter().rev().cloned().collect();
    let mut named_put = DISPID_PROPERTYPUT;
    let mut params = DISPPARAMS {
        rgvarg: reversed.as_mut_ptr(),
        cArgs: reversed.len() as u32,
        ..Default::default()
    };
    if flags == DISPATCH_PROPERTYPUT {
        params.cNamedArgs = 1;
        params.rgdispidNamedArgs = &mut named_put;
    }
    let mut result = VARIANT::default();
    unsafe {
        object.Invoke(
            member,
            &GUID::zeroed(),
            LOCALE_USER_DEFAULT,
            flags,
            &params,
            Some(&mut result),
            None,
            None,
        )
    }
    .map_err(|e| GuiError::Call(format!("'{name}' failed: {}", e.message())))?;
    Ok(result)
}

fn get_property(object: &IDispatch, name: &str) -> GuiResult<VARIANT> {
    invoke(object, name, DISPATCH_PROPERTYGET, &[])
}

fn put_property(object: &IDispatch, name: &str, value: VARIANT) -> GuiResult<()> {
    invoke(object, name, DISPATCH_PROPERTYPUT, &[value]).map(|_| ())
}

fn call(object: &IDispatch, name: &str, args: &[VARIANT]) -> GuiResult<VARIANT> {
    invoke(object, name, DISPATCH_METHOD, args)
}

fn as_dispatch(value: &VARIANT, what: &'static str) -> GuiResult<IDispatch> {
    IDispatch::try_from(value).map_err(|_| GuiError::UnexpectedValue(what))
}

fn as_string(value: &VARIANT, what: &'static str) -> GuiResult<String> {
    BSTR::try_from(value)
        .map(|b| b.to_string())
        .map_err(|_| GuiError::UnexpectedValue(what))
}

fn as_bool(value: &VARIANT, what: &'static str) -> GuiResult<bool> {
    bool::try_from(value).map_err(|_| GuiError::UnexpectedValue(what))
}

fn as_i32(value: &VARIANT, what: &'static str) -> GuiResult<i32> {
    i32::try_from(value).map_err(|_| GuiError::UnexpectedValue(what))
}

/// Iterate an engine collection (`Children`) into its `IDispatch` items.
fn children_of(object: &IDispatch) -> GuiResult<Vec<IDispatch>> {
    let collection = as_dispatch(&get_property(object, "Children")?, "Children")?;
    let count = as_i32(&get_property(&collection, "Count")?, "Children.Count")?;
    let mut items = Vec::with_capacity(count.max(0) as usize);
    for index in 0..count {
        let item = call(&collection, "Item", &[VARIANT::from(index)])?;
        items.push(as_dispatch(&item, "Children.Item")?);
    }
    Ok(items)
}

/// Looks up the running scripting engine through the running object table.
pub struct ComEngineProvider {
    // COM stays initialized for as long as the provider lives.
    _apartment: Apartment,
}

struct Apartment;

impl Apartment {
    fn enter() -> GuiResult<Self> {
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
            .ok()
            .map_err(|e| GuiError::Call(format!("COM initialization failed: {}", e.message())))?;
        Ok(Apartment)
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

impl ComEngineProvider {
    pub fn new() -> GuiResult<Self> {
        Ok(Self { _apartment: Apartment::enter()? })
    }
}

impl super::EngineProvider for ComEngineProvider {
    fn running_engine(&self) -> GuiResult<Option<Box<dyn GuiEngine>>> {
        let clsid = match unsafe { CLSIDFromProgID(ENGINE_PROG_ID) } {
            Ok(clsid) => clsid,
            Err(e) => {
                // The prog id is only registered once the client is installed.
                debug!("SAPGUI prog id not registered: {}", e.message());
                return Ok(None);
            }
        };
        let mut unknown: Option<IUnknown> = None;
        if unsafe { GetActiveObject(&clsid, None, &mut unknown) }.is_err() {
            return Ok(None);
        }
        let Some(unknown) = unknown else {
            return Ok(None);
        };
        let wrapper: IDispatch = unknown
            .cast()
            .map_err(|_| GuiError::UnexpectedValue("SAPGUI automation object"))?;
        let engine = as_dispatch(
            &get_property(&wrapper, "GetScriptingEngine")?,
            "GetScriptingEngine",
        )?;
        Ok(Some(Box::new(ComEngine { object: engine })))
    }
}

struct ComEngine {
    object: IDispatch,
}

impl GuiEngine for ComEngine {
    fn connections(&self) -> GuiResult<Vec<Box<dyn GuiConnection>>> {
        Ok(children_of(&self.object)?
            .into_iter()
            .map(|object| Box::new(ComConnection { object }) as Box<dyn GuiConnection>)
            .collect())
    }

    fn open_connection(&self, description: &str, visible: bool) -> GuiResult<Box<dyn GuiConnection>> {
        let result = call(
            &self.object,
            "OpenConnection",
            &[VARIANT::from(BSTR::from(description)), VARIANT::from(visible)],
        )?;
        Ok(Box::new(ComConnection { object: as_dispatch(&result, "OpenConnection")? }))
    }
}

struct ComConnection {
    object: IDispatch,
}

impl GuiConnection for ComConnection {
    fn description(&self) -> GuiResult<String> {
        as_string(&get_property(&self.object, "Description")?, "Description")
    }

    fn sessions(&self) -> GuiResult<Vec<Box<dyn GuiSession>>> {
        Ok(children_of(&self.object)?
            .into_iter()
            .map(|object| Box::new(ComSession { object }) as Box<dyn GuiSession>)
            .collect())
    }
}

struct ComSession {
    object: IDispatch,
}

impl ComSession {
    fn find_by_id(&self, path: &str) -> GuiResult<IDispatch> {
        let result = call(&self.object, "findById", &[VARIANT::from(BSTR::from(path))])?;
        as_dispatch(&result, "findById")
    }
}

impl GuiSession for ComSession {
    fn transaction(&self) -> GuiResult<String> {
        let info = as_dispatch(&get_property(&self.object, "Info")?, "Info")?;
        as_string(&get_property(&info, "Transaction")?, "Info.Transaction")
    }

    fn is_busy(&self) -> GuiResult<bool> {
        as_bool(&get_property(&self.object, "Busy")?, "Busy")
    }

    fn create_session(&self) -> GuiResult<()> {
        call(&self.object, "CreateSession", &[]).map(|_| ())
    }

    fn start_transaction(&self, code: &str) -> GuiResult<()> {
        call(&self.object, "StartTransaction", &[VARIANT::from(BSTR::from(code))]).map(|_| ())
    }

    fn field(&self, id: FieldId) -> GuiResult<Box<dyn Field>> {
        let control = self.find_by_id(field_path(id)?)?;
        Ok(Box::new(ComField { object: control }))
    }

    fn press(&self, id: ControlId) -> GuiResult<()> {
        match control_action(id)? {
            ControlAction::Button(path) => {
                call(&self.find_by_id(path)?, "press", &[]).map(|_| ())
            }
            ControlAction::ToolbarButton(path, code) => call(
                &self.find_by_id(path)?,
                "pressToolbarButton",
                &[VARIANT::from(BSTR::from(code))],
            )
            .map(|_| ()),
            ControlAction::ToolbarContextButton(path, code) => call(
                &self.find_by_id(path)?,
                "pressToolbarContextButton",
                &[VARIANT::from(BSTR::from(code))],
            )
            .map(|_| ()),
            ControlAction::ContextMenuItem(path, code) => call(
                &self.find_by_id(path)?,
                "selectContextMenuItem",
                &[VARIANT::from(BSTR::from(code))],
            )
            .map(|_| ()),
            ControlAction::Checkbox(_) => Err(GuiError::UnknownControl(id.0)),
        }
    }

    fn set_checkbox(&self, id: ControlId, selected: bool) -> GuiResult<()> {
        match control_action(id)? {
            ControlAction::Checkbox(path) => {
                put_property(&self.find_by_id(path)?, "Selected", VARIANT::from(selected))
            }
            _ => Err(GuiError::UnknownControl(id.0)),
        }
    }

    fn send_vkey(&self, window: GuiWindow, key: VKey) -> GuiResult<()> {
        let path = match window {
            GuiWindow::Main => "wnd[0]",
            GuiWindow::Dialog => "wnd[1]",
        };
        call(&self.find_by_id(path)?, "sendVKey", &[VARIANT::from(i32::from(key.code()))])
            .map(|_| ())
    }
}

struct ComField {
    object: IDispatch,
}

impl Field for ComField {
    fn text(&self) -> GuiResult<String> {
        as_string(&get_property(&self.object, "Text")?, "Text")
    }

    fn set_text(&self, value: &str) -> GuiResult<()> {
        put_property(&self.object, "Text", VARIANT::from(BSTR::from(value)))
    }
}

enum ControlAction {
    Button(&'static str),
    ToolbarButton(&'static str, &'static str),
    ToolbarContextButton(&'static str, &'static str),
    ContextMenuItem(&'static str, &'static str),
    Checkbox(&'static str),
}

const RESULT_GRID: &str = "wnd[0]/shellcont/shell";

/// Logical field id -> SAP control path.
fn field_path(id: FieldId) -> GuiResult<&'static str> {
    Ok(match id {
        controls::LOGIN_USERNAME => "wnd[0]/usr/txtRSYST-BNAME",
        controls::LOGIN_PASSWORD => "wnd[0]/usr/pwdRSYST-BCODE",
        controls::VARIANT_NAME => "wnd[1]/usr/txtV-LOW",
        controls::VARIANT_CREATED_BY => "wnd[1]/usr/txtENAME-LOW",
        controls::POSTING_DATE_FROM => "wnd[0]/usr/ctxtS_PDATE-LOW",
        controls::POSTING_DATE_TO => "wnd[0]/usr/ctxtS_PDATE-HIGH",
        controls::EXPORT_FILE_NAME => {
            "wnd[1]/usr/subSUB_CONFIGURATION:SAPLSALV_GUI_CUL_EXPORT_AS:0512/txtGS_EXPORT-FILE_NAME"
        }
        controls::EXPORT_DIRECTORY => "wnd[1]/usr/ctxtDY_PATH",
        _ => return Err(GuiError::UnknownControl(id.0)),
    })
}

/// Logical control id -> SAP control path plus the call needed to drive it.
fn control_action(id: ControlId) -> GuiResult<ControlAction> {
    Ok(match id {
        controls::VARIANT_PICKER => ControlAction::Button("wnd[0]/tbar[1]/btn[17]"),
        controls::SPECIAL_GL_ITEMS => ControlAction::Checkbox("wnd[0]/usr/chkP_TY_SPG"),
        controls::GRID_TOOLBAR_EXPAND => ControlAction::ToolbarButton(RESULT_GRID, "SHOWBUT"),
        controls::GRID_EXPORT_MENU => {
            ControlAction::ToolbarContextButton(RESULT_GRID, "&MB_EXPORT")
        }
        controls::GRID_EXPORT_SPREADSHEET => ControlAction::ContextMenuItem(RESULT_GRID, "&XXL"),
        controls::EXPORT_CONTINUE => ControlAction::Button("wnd[1]/tbar[0]/btn[20]"),
        _ => return Err(GuiError::UnknownControl(id.0)),
    })
}
